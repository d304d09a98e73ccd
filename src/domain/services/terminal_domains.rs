// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use regex::{RegexSet, RegexSetBuilder};

/// 内置的终止域名模式
pub const DEFAULT_TERMINAL_PATTERN: &str = r"^https?://(www\.)?odnoklassniki\.ru/.*\.redirect$";

/// 终止域名集合
///
/// URL 命中任意模式时，重定向跟踪立即停止。
#[derive(Debug, Clone)]
pub struct TerminalDomains {
    set: RegexSet,
}

impl TerminalDomains {
    pub fn new<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set = RegexSetBuilder::new(patterns)
            .case_insensitive(true)
            .build()?;
        Ok(Self { set })
    }

    pub fn is_terminal(&self, url: &str) -> bool {
        self.set.is_match(url)
    }
}

impl Default for TerminalDomains {
    fn default() -> Self {
        Self::new([DEFAULT_TERMINAL_PATTERN]).unwrap_or_else(|_| Self {
            set: RegexSet::empty(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pattern() {
        let domains = TerminalDomains::default();
        assert!(domains.is_terminal("http://www.odnoklassniki.ru/sdfst.redirect"));
        assert!(domains.is_terminal("http://odnoklassniki.ru/a/b.redirect"));
        assert!(!domains.is_terminal("http://www.odnoklassniki.ru/profile"));
        assert!(!domains.is_terminal("url"));
    }

    #[test]
    fn test_custom_suffix_pattern() {
        let domains = TerminalDomains::new([r"\.redirect$"]).unwrap();
        assert!(domains.is_terminal("http://www.example-terminal.com/x.redirect"));
        assert!(!domains.is_terminal("http://www.example-terminal.com/x.html"));
    }

    #[test]
    fn test_empty_set_never_matches() {
        let domains = TerminalDomains::new(Vec::<String>::new()).unwrap();
        assert!(!domains.is_terminal("http://www.odnoklassniki.ru/sdfst.redirect"));
    }
}
