/*!
Палитра цветов, разобранная из переменных окружения GREP_COLOR и
GREP_COLORS.

GREP_COLORS — это список `роль=SGR` через двоеточие, например
`mt=1;31:ln=32`. Значение роли — параметры ANSI SGR (цифры и точки с
запятой); всё остальное в значении игнорируется, как и неизвестные роли.
GREP_COLOR, если задан, устанавливает только цвет совпадения. Токен `rv`
означает «поменять местами цвета выбранной и контекстной строки при -v».
*/

/// Одиннадцать SGR-строк по ролям. Пустая строка значит «без цвета».
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ColorPalette {
    selected: String,
    context: String,
    matched: String,
    matched_selected: String,
    matched_context: String,
    filename: String,
    lineno: String,
    column: String,
    offset: String,
    separator: String,
    reset: String,
}

/// Палитра по умолчанию, когда цвет включён, но окружение молчит.
const DEFAULT_COLORS: &str = "mt=1;31:cx=2:fn=35:ln=32:cn=32:bn=32:se=36";

impl ColorPalette {
    /// Палитра без цветов: каждый префикс и сброс — пустые строки.
    pub fn disabled() -> ColorPalette {
        ColorPalette::default()
    }

    /// Построить палитру из значений окружения.
    ///
    /// `invert` — включена ли опция -v; вместе с токеном `rv` она меняет
    /// местами цвета выбранной и контекстной строки. Если `ms` или `mc`
    /// не заданы, они наследуют значение `mt`.
    pub fn from_env(
        grep_colors: Option<&str>,
        grep_color: Option<&str>,
        invert: bool,
    ) -> ColorPalette {
        let mut palette = ColorPalette::default();
        let colors = match (grep_color, grep_colors) {
            (Some(color), spec) => {
                palette.matched = sgr_sequence(color).unwrap_or_default();
                spec
            }
            (None, None) => Some(DEFAULT_COLORS),
            (None, spec) => spec,
        };
        if let Some(colors) = colors {
            for (role, slot) in [
                ("sl", &mut palette.selected),
                ("cx", &mut palette.context),
                ("mt", &mut palette.matched),
                ("ms", &mut palette.matched_selected),
                ("mc", &mut palette.matched_context),
                ("fn", &mut palette.filename),
                ("ln", &mut palette.lineno),
                ("cn", &mut palette.column),
                ("bn", &mut palette.offset),
                ("se", &mut palette.separator),
            ] {
                if let Some(seq) = lookup_role(colors, role) {
                    *slot = seq;
                }
            }
            if invert && colors.split(':').any(|token| token == "rv") {
                std::mem::swap(&mut palette.selected, &mut palette.context);
            }
        }
        if palette.matched_selected.is_empty() {
            palette.matched_selected = palette.matched.clone();
        }
        if palette.matched_context.is_empty() {
            palette.matched_context = palette.matched.clone();
        }
        palette.reset = "\x1b[0m".to_string();
        palette
    }

    /// Включён ли цвет вообще.
    pub fn is_enabled(&self) -> bool {
        !self.reset.is_empty()
    }

    /// Цвет выбранной строки (sl).
    pub fn selected(&self) -> &str {
        &self.selected
    }

    /// Цвет контекстной строки (cx).
    pub fn context(&self) -> &str {
        &self.context
    }

    /// Цвет совпавшего текста в любой строке (mt).
    pub fn matched(&self) -> &str {
        &self.matched
    }

    /// Цвет совпадения в выбранной строке (ms).
    pub fn matched_selected(&self) -> &str {
        &self.matched_selected
    }

    /// Цвет совпадения в контекстной строке (mc).
    pub fn matched_context(&self) -> &str {
        &self.matched_context
    }

    /// Цвет имени файла (fn).
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Цвет номера строки (ln).
    pub fn lineno(&self) -> &str {
        &self.lineno
    }

    /// Цвет номера столбца (cn).
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Цвет смещения в байтах (bn).
    pub fn offset(&self) -> &str {
        &self.offset
    }

    /// Цвет разделителей (se).
    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Последовательность сброса; пустая, когда цвет выключен.
    pub fn reset(&self) -> &str {
        &self.reset
    }
}

/// Найти роль в списке и вернуть готовую SGR-последовательность.
/// При повторении роли действует первое вхождение.
fn lookup_role(colors: &str, role: &str) -> Option<String> {
    for token in colors.split(':') {
        if let Some(value) =
            token.strip_prefix(role).and_then(|rest| rest.strip_prefix('='))
        {
            return sgr_sequence(value);
        }
    }
    None
}

/// Превратить параметры SGR в управляющую последовательность.
/// Берутся только ведущие цифры и точки с запятой.
fn sgr_sequence(value: &str) -> Option<String> {
    let params: String = value
        .chars()
        .take_while(|ch| ch.is_ascii_digit() || *ch == ';')
        .collect();
    if params.is_empty() {
        None
    } else {
        Some(format!("\x1b[{params}m"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_palette_is_all_empty() {
        let p = ColorPalette::disabled();
        assert!(!p.is_enabled());
        assert_eq!(p.matched_selected(), "");
        assert_eq!(p.reset(), "");
    }

    #[test]
    fn default_palette_when_env_is_empty() {
        let p = ColorPalette::from_env(None, None, false);
        assert!(p.is_enabled());
        assert_eq!(p.matched(), "\x1b[1;31m");
        assert_eq!(p.context(), "\x1b[2m");
        assert_eq!(p.filename(), "\x1b[35m");
        assert_eq!(p.separator(), "\x1b[36m");
        // ms и mc наследуют mt.
        assert_eq!(p.matched_selected(), "\x1b[1;31m");
        assert_eq!(p.matched_context(), "\x1b[1;31m");
    }

    #[test]
    fn grep_colors_overrides_roles() {
        let p = ColorPalette::from_env(
            Some("mt=01;32:sl=33:ms=4:zz=9"),
            None,
            false,
        );
        assert_eq!(p.matched(), "\x1b[01;32m");
        assert_eq!(p.selected(), "\x1b[33m");
        assert_eq!(p.matched_selected(), "\x1b[4m");
        // mc не задан и наследует mt.
        assert_eq!(p.matched_context(), "\x1b[01;32m");
    }

    #[test]
    fn grep_color_sets_match_only() {
        let p = ColorPalette::from_env(None, Some("1;35"), false);
        assert_eq!(p.matched(), "\x1b[1;35m");
        assert_eq!(p.matched_selected(), "\x1b[1;35m");
        // Остальные роли пустые: палитра по умолчанию не применяется.
        assert_eq!(p.filename(), "");
        assert_eq!(p.lineno(), "");
    }

    #[test]
    fn rv_swaps_selected_and_context_under_invert() {
        let spec = "sl=1:cx=2:rv";
        let plain = ColorPalette::from_env(Some(spec), None, false);
        assert_eq!(plain.selected(), "\x1b[1m");
        assert_eq!(plain.context(), "\x1b[2m");
        let inverted = ColorPalette::from_env(Some(spec), None, true);
        assert_eq!(inverted.selected(), "\x1b[2m");
        assert_eq!(inverted.context(), "\x1b[1m");
    }

    #[test]
    fn garbage_in_value_is_truncated() {
        let p = ColorPalette::from_env(Some("ln=32abc"), None, false);
        assert_eq!(p.lineno(), "\x1b[32m");
    }
}
