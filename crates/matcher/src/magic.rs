/*!
Матчер «магических байтов»: маленькое регулярное выражение, которое
проверяется по префиксу файла, чтобы распознать тип файла независимо от
его расширения.
*/

use regex_automata::{meta, util::syntax, Anchored, Input};

use crate::Error;

/// Объединение всех шаблонов -M, скомпилированное в один автомат.
///
/// Пустой набор шаблонов даёт «выключенный» матчер: он ничего не
/// распознаёт и фильтрация по магическим байтам не выполняется.
#[derive(Debug, Default)]
pub struct MagicMatcher {
    re: Option<meta::Regex>,
}

impl MagicMatcher {
    /// Скомпилировать объединение шаблонов магических байтов.
    ///
    /// Шаблоны сопоставляются с сырыми байтами, поэтому Unicode-расширение
    /// выключено: `\xFF` означает байт 0xFF, а не кодовую точку.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<MagicMatcher, Error> {
        if patterns.is_empty() {
            return Ok(MagicMatcher { re: None });
        }
        let union = patterns
            .iter()
            .map(|p| p.as_ref())
            .collect::<Vec<&str>>()
            .join("|");
        let re = meta::Regex::builder()
            .syntax(syntax::Config::new().utf8(false).unicode(false))
            .configure(meta::Regex::config().utf8_empty(false))
            .build(&union)
            .map_err(|err| Error::Syntax(err.to_string()))?;
        Ok(MagicMatcher { re: Some(re) })
    }

    /// Есть ли хотя бы один шаблон.
    pub fn is_enabled(&self) -> bool {
        self.re.is_some()
    }

    /// Проверить префикс файла: совпадение засчитывается только от самого
    /// начала ввода, как у сигнатур форматов и строк-шебангов.
    pub fn scan(&self, prefix: &[u8]) -> bool {
        match self.re {
            None => false,
            Some(ref re) => re
                .find(Input::new(prefix).anchored(Anchored::Yes))
                .is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_without_patterns() {
        let magic = MagicMatcher::new::<&str>(&[]).unwrap();
        assert!(!magic.is_enabled());
        assert!(!magic.scan(b"anything"));
    }

    #[test]
    fn shebang_is_recognized() {
        let magic =
            MagicMatcher::new(&[r"#!/.*\Wpython(\W.*)?\n"]).unwrap();
        assert!(magic.scan(b"#!/usr/bin/python\nprint()\n"));
        assert!(magic.scan(b"#!/usr/bin/env python\n"));
        assert!(!magic.scan(b"print()\n#!/usr/bin/python\n"));
    }

    #[test]
    fn binary_signature_is_recognized() {
        let magic = MagicMatcher::new(&[r"\x89PNG\x0d\x0a\x1a\x0a"]).unwrap();
        assert!(magic.scan(b"\x89PNG\x0d\x0a\x1a\x0a\x00\x00"));
        assert!(!magic.scan(b"GIF89a"));
    }

    #[test]
    fn union_of_patterns() {
        let magic =
            MagicMatcher::new(&["GIF87a|GIF89a", r"\x25PDF-"]).unwrap();
        assert!(magic.scan(b"GIF89a..."));
        assert!(magic.scan(b"%PDF-1.7"));
        assert!(!magic.scan(b"JFIF"));
    }
}
