/*!
Опциональный движок PCRE2 для Perl-совместимых шаблонов (-P).

Компилируется только с фичей `pcre2`. В отличие от движка по умолчанию,
PCRE2 бэктрекает и поэтому может отказать во время самого поиска
(например, по лимиту глубины); такие отказы всплывают как ошибки.
*/

use crate::{Error, PatternSpec, Span};

/// Обёртка над скомпилированным шаблоном PCRE2.
#[derive(Debug)]
pub(crate) struct PcreMatcher {
    re: pcre2::bytes::Regex,
    empty_allowed: bool,
}

impl PcreMatcher {
    /// Скомпилировать собранный шаблон движком PCRE2.
    ///
    /// Встроенные флаги `(?m[i][x])` из собранного выражения PCRE2 понимает
    /// сам, поэтому здесь настраивается только Unicode: без -U включаются
    /// UTF-режим и Unicode-свойства символьных классов.
    pub(crate) fn new(spec: &PatternSpec) -> Result<PcreMatcher, Error> {
        let mut builder = pcre2::bytes::RegexBuilder::new();
        builder.utf(spec.unicode());
        builder.ucp(spec.unicode());
        builder.jit_if_available(true);
        let re = builder
            .build(spec.source())
            .map_err(|err| Error::Syntax(err.to_string()))?;
        Ok(PcreMatcher { re, empty_allowed: spec.empty_allowed() })
    }

    pub(crate) fn find_at(
        &self,
        haystack: &[u8],
        at: usize,
    ) -> Result<Option<Span>, Error> {
        match self.re.find_at(haystack, at) {
            Ok(None) => Ok(None),
            Ok(Some(m)) => Ok(Some(Span { start: m.start(), end: m.end() })),
            Err(err) => Err(Error::Syntax(err.to_string())),
        }
    }

    pub(crate) fn empty_allowed(&self) -> bool {
        self.empty_allowed
    }
}
