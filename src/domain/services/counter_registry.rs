// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use regex::{RegexSet, RegexSetBuilder};
use serde::Deserialize;
use std::collections::BTreeSet;

/// 计数器模式定义
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CounterPattern {
    /// 计数器名称，多个模式可以共用一个名称
    pub name: String,
    /// 正则表达式（不区分大小写）
    pub pattern: String,
}

impl CounterPattern {
    pub fn new(name: &str, pattern: &str) -> Self {
        Self {
            name: name.to_string(),
            pattern: pattern.to_string(),
        }
    }
}

/// 内置的计数器模式
pub fn default_counter_patterns() -> Vec<CounterPattern> {
    vec![
        CounterPattern::new("GOOGLE_ANALYTICS", r"google-analytics\.com/ga\.js"),
        CounterPattern::new("YA_METRICA", r"mc\.yandex\.ru/metrika/watch\.js"),
        CounterPattern::new("TOP_MAIL_RU", r"top-fwz1\.mail\.ru/counter"),
        CounterPattern::new("TOP_MAIL_RU", r"top\.mail\.ru/jump\?from"),
        CounterPattern::new("DOUBLECLICK", r"\.doubleclick\.net/"),
        CounterPattern::new("VISTATS", r"vistats\.mail\.ru"),
        CounterPattern::new("LI_RU", r"/counter\.yadro\.ru/hit"),
        CounterPattern::new("RAMBLER_TOP100", r"counter\.rambler\.ru/top100"),
    ]
}

/// 计数器注册表
///
/// 名称到匹配模式的静态映射，纯查找，无状态。
#[derive(Debug, Clone)]
pub struct CounterRegistry {
    names: Vec<String>,
    set: RegexSet,
}

impl CounterRegistry {
    pub fn new(patterns: &[CounterPattern]) -> Result<Self, regex::Error> {
        let set = RegexSetBuilder::new(patterns.iter().map(|p| p.pattern.as_str()))
            .case_insensitive(true)
            .build()?;
        Ok(Self {
            names: patterns.iter().map(|p| p.name.clone()).collect(),
            set,
        })
    }

    /// 返回文本中出现的所有计数器名称
    pub fn matches(&self, text: &str) -> BTreeSet<String> {
        self.set
            .matches(text)
            .into_iter()
            .map(|idx| self.names[idx].clone())
            .collect()
    }
}

impl Default for CounterRegistry {
    fn default() -> Self {
        // The built-in patterns are constant and known to compile.
        Self::new(&default_counter_patterns()).unwrap_or_else(|_| Self {
            names: Vec::new(),
            set: RegexSet::empty(),
        })
    }
}
