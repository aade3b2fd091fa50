/*!
Принтер классического grep-вывода.

Принтер владеет писателем и палитрой и умеет ровно то, что нужно
поисковому движку: заголовок с именем файла и позициями, раскрашенные
отрезки строки, строку-счётчик, имя файла целиком, разделитель групп и
служебные переводы строки. Порядок полей заголовка фиксирован: имя
файла, номер строки, номер столбца, смещение в байтах; после каждого
поля — разделитель вызывающего.
*/

use std::io::{self, Write};

use crate::color::ColorPalette;

/// Роль отрезка строки при выводе.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Role {
    /// Часть выбранной строки вне совпадения.
    Selected,
    /// Часть контекстной строки вне совпадения.
    Context,
    /// Совпавший текст в выбранной строке.
    MatchSelected,
    /// Совпавший текст в контекстной строке.
    MatchContext,
}

/// Настройки вывода, снятые с флагов один раз.
#[derive(Clone, Debug)]
pub struct PrinterConfig {
    /// Печатать ли имя файла перед каждой записью.
    pub with_filename: bool,
    /// -Z: NUL вместо разделителя после имени файла.
    pub null: bool,
    /// -n: печатать номер строки.
    pub line_number: bool,
    /// -N: печатать только заголовок с номером строки.
    pub only_line_number: bool,
    /// -k: печатать номер столбца.
    pub column_number: bool,
    /// -b: печатать смещение в байтах.
    pub byte_offset: bool,
    /// Печатать смещение шестнадцатерично (действует режим -X).
    pub hex_offset: bool,
    /// -T: выравнивание полей и табуляция после заголовка.
    pub initial_tab: bool,
    /// Разделитель полей для совпадений; по умолчанию `:`.
    pub separator: String,
    /// Разделитель групп контекста; None означает «не печатать».
    pub group_separator: Option<String>,
    /// --line-buffered: сбрасывать буфер после каждой записи.
    pub line_buffered: bool,
}

impl Default for PrinterConfig {
    fn default() -> PrinterConfig {
        PrinterConfig {
            with_filename: false,
            null: false,
            line_number: false,
            only_line_number: false,
            column_number: false,
            byte_offset: false,
            hex_offset: false,
            initial_tab: false,
            separator: ":".to_string(),
            group_separator: Some("--".to_string()),
            line_buffered: false,
        }
    }
}

/// Принтер, владеющий писателем.
#[derive(Debug)]
pub struct Printer<W> {
    wtr: W,
    config: PrinterConfig,
    colors: ColorPalette,
}

impl<W: Write> Printer<W> {
    /// Создать принтер поверх данного писателя.
    pub fn new(
        wtr: W,
        config: PrinterConfig,
        colors: ColorPalette,
    ) -> Printer<W> {
        Printer { wtr, config, colors }
    }

    /// Изменяемая ссылка на базовый писатель.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.wtr
    }

    /// Забрать базовый писатель.
    pub fn into_inner(self) -> W {
        self.wtr
    }

    /// Настройки принтера.
    pub fn config(&self) -> &PrinterConfig {
        &self.config
    }

    /// Палитра принтера.
    pub fn colors(&self) -> &ColorPalette {
        &self.colors
    }

    /// Вывести заголовок записи: включённые поля в фиксированном порядке,
    /// каждое со своим цветом, разделитель после последнего поля. При
    /// `newline` заголовок завершается переводом строки (нужно
    /// шестнадцатеричному дамперу).
    pub fn header(
        &mut self,
        name: Option<&str>,
        lineno: u64,
        column: u64,
        offset: u64,
        sep: &str,
        newline: bool,
    ) -> io::Result<()> {
        let Some(name) = name else { return Ok(()) };
        let mut sep_pending = false;
        if self.config.with_filename {
            self.write_colored_owned(ColorField::Filename, name.as_bytes())?;
            if self.config.null {
                self.wtr.write_all(b"\0")?;
            } else {
                sep_pending = true;
            }
        }
        if self.config.line_number || self.config.only_line_number {
            if sep_pending {
                self.write_separator(sep)?;
            }
            let text = if self.config.initial_tab {
                format!("{lineno:6}")
            } else {
                format!("{lineno}")
            };
            self.write_colored_owned(ColorField::LineNo, text.as_bytes())?;
            sep_pending = true;
        }
        if self.config.column_number {
            if sep_pending {
                self.write_separator(sep)?;
            }
            let text = if self.config.initial_tab {
                format!("{column:3}")
            } else {
                format!("{column}")
            };
            self.write_colored_owned(ColorField::Column, text.as_bytes())?;
            sep_pending = true;
        }
        if self.config.byte_offset {
            if sep_pending {
                self.write_separator(sep)?;
            }
            let text = match (self.config.hex_offset, self.config.initial_tab)
            {
                (true, true) => format!("{offset:7x}"),
                (true, false) => format!("{offset:x}"),
                (false, true) => format!("{offset:7}"),
                (false, false) => format!("{offset}"),
            };
            self.write_colored_owned(ColorField::Offset, text.as_bytes())?;
            sep_pending = true;
        }
        if sep_pending {
            self.write_separator(sep)?;
            if self.config.initial_tab {
                self.wtr.write_all(b"\t")?;
            }
            if newline {
                self.wtr.write_all(b"\n")?;
            }
        }
        Ok(())
    }

    /// Вывести отрезок строки в цвете его роли.
    pub fn write_span(&mut self, role: Role, bytes: &[u8]) -> io::Result<()> {
        let color = match role {
            Role::Selected => self.colors.selected(),
            Role::Context => self.colors.context(),
            Role::MatchSelected => self.colors.matched_selected(),
            Role::MatchContext => self.colors.matched_context(),
        };
        let color = color.to_string();
        self.write_colored(&color, bytes)
    }

    /// Вывести имя файла целиком (-l/-L): с цветом и завершителем.
    pub fn write_filename(&mut self, name: &str) -> io::Result<()> {
        self.write_colored_owned(ColorField::Filename, name.as_bytes())?;
        self.wtr.write_all(if self.config.null { b"\0" } else { b"\n" })?;
        self.flush_if_line_buffered()
    }

    /// Вывести счётчик (-c) с необязательным именем файла.
    pub fn write_count(
        &mut self,
        name: Option<&str>,
        count: u64,
    ) -> io::Result<()> {
        if let Some(name) = name {
            self.write_colored_owned(ColorField::Filename, name.as_bytes())?;
            if self.config.null {
                self.wtr.write_all(b"\0")?;
            } else {
                let sep = self.config.separator.clone();
                self.write_separator(&sep)?;
            }
        }
        writeln!(self.wtr, "{count}")?;
        self.flush_if_line_buffered()
    }

    /// Вывести разделитель групп, если он не подавлен.
    pub fn write_group_separator(&mut self) -> io::Result<()> {
        let Some(group_separator) = self.config.group_separator.clone()
        else {
            return Ok(());
        };
        self.write_colored_owned(
            ColorField::Separator,
            group_separator.as_bytes(),
        )?;
        self.wtr.write_all(b"\n")
    }

    /// Сообщение о совпадении в двоичном файле. С размером — вариант
    /// режима «только совпадения».
    pub fn write_binary_notice(
        &mut self,
        name: &str,
        size: Option<u64>,
    ) -> io::Result<()> {
        match size {
            None => writeln!(self.wtr, "Binary file {name} matches"),
            Some(n) => {
                writeln!(self.wtr, "Binary file {name} matches {n} bytes")
            }
        }
    }

    /// Пустая строка и сброс буфера (--break).
    pub fn write_break(&mut self) -> io::Result<()> {
        self.wtr.write_all(b"\n")?;
        self.wtr.flush()
    }

    /// Сырые байты без раскраски.
    pub fn write_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.wtr.write_all(bytes)
    }

    /// Сбросить буфер, если включена построчная буферизация.
    pub fn flush_if_line_buffered(&mut self) -> io::Result<()> {
        if self.config.line_buffered {
            self.wtr.flush()?;
        }
        Ok(())
    }

    /// Сбросить буфер безусловно.
    pub fn flush(&mut self) -> io::Result<()> {
        self.wtr.flush()
    }

    /// Разделитель полей в своём цвете.
    pub fn write_separator(&mut self, sep: &str) -> io::Result<()> {
        let color = self.colors.separator().to_string();
        self.write_colored(&color, sep.as_bytes())
    }

    fn write_colored(&mut self, color: &str, bytes: &[u8]) -> io::Result<()> {
        self.wtr.write_all(color.as_bytes())?;
        self.wtr.write_all(bytes)?;
        self.wtr.write_all(self.colors.reset().as_bytes())
    }

    fn write_colored_owned(
        &mut self,
        field: ColorField,
        bytes: &[u8],
    ) -> io::Result<()> {
        let color = match field {
            ColorField::Filename => self.colors.filename(),
            ColorField::LineNo => self.colors.lineno(),
            ColorField::Column => self.colors.column(),
            ColorField::Offset => self.colors.offset(),
            ColorField::Separator => self.colors.separator(),
        }
        .to_string();
        self.write_colored(&color, bytes)
    }
}

/// Поле заголовка для выбора цвета.
#[derive(Clone, Copy, Debug)]
enum ColorField {
    Filename,
    LineNo,
    Column,
    Offset,
    Separator,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn printer(config: PrinterConfig) -> Printer<Vec<u8>> {
        Printer::new(vec![], config, ColorPalette::disabled())
    }

    fn colored(config: PrinterConfig) -> Printer<Vec<u8>> {
        Printer::new(
            vec![],
            config,
            ColorPalette::from_env(Some("fn=35:ln=32:se=36"), None, false),
        )
    }

    #[test]
    fn header_fields_in_order() {
        let mut p = printer(PrinterConfig {
            with_filename: true,
            line_number: true,
            column_number: true,
            byte_offset: true,
            ..PrinterConfig::default()
        });
        p.header(Some("a.txt"), 3, 7, 42, ":", false).unwrap();
        assert_eq!(p.into_inner(), b"a.txt:3:7:42:");
    }

    #[test]
    fn header_without_fields_is_empty() {
        let mut p = printer(PrinterConfig::default());
        p.header(Some("a.txt"), 3, 7, 42, ":", false).unwrap();
        assert!(p.into_inner().is_empty());
    }

    #[test]
    fn null_replaces_filename_separator() {
        let mut p = printer(PrinterConfig {
            with_filename: true,
            line_number: true,
            null: true,
            ..PrinterConfig::default()
        });
        p.header(Some("a.txt"), 3, 0, 0, ":", false).unwrap();
        assert_eq!(p.into_inner(), b"a.txt\x003:");
    }

    #[test]
    fn initial_tab_pads_fields() {
        let mut p = printer(PrinterConfig {
            line_number: true,
            initial_tab: true,
            ..PrinterConfig::default()
        });
        p.header(Some("a.txt"), 3, 0, 0, ":", false).unwrap();
        assert_eq!(p.into_inner(), b"     3:\t");
    }

    #[test]
    fn hex_offset_formatting() {
        let mut p = printer(PrinterConfig {
            byte_offset: true,
            hex_offset: true,
            ..PrinterConfig::default()
        });
        p.header(Some("a.txt"), 1, 0, 255, ":", false).unwrap();
        assert_eq!(p.into_inner(), b"ff:");
    }

    #[test]
    fn colored_header_brackets_every_field() {
        let mut p = colored(PrinterConfig {
            with_filename: true,
            line_number: true,
            ..PrinterConfig::default()
        });
        p.header(Some("a"), 1, 0, 0, ":", false).unwrap();
        assert_eq!(
            p.into_inner(),
            b"\x1b[35ma\x1b[0m\x1b[36m:\x1b[0m\x1b[32m1\x1b[0m\x1b[36m:\x1b[0m"
        );
    }

    #[test]
    fn count_with_filename() {
        let mut p = printer(PrinterConfig {
            with_filename: true,
            ..PrinterConfig::default()
        });
        p.write_count(Some("a.txt"), 2).unwrap();
        assert_eq!(p.into_inner(), b"a.txt:2\n");
    }

    #[test]
    fn group_separator_can_be_suppressed() {
        let mut p = printer(PrinterConfig {
            group_separator: None,
            ..PrinterConfig::default()
        });
        p.write_group_separator().unwrap();
        assert!(p.into_inner().is_empty());
    }

    #[test]
    fn filename_with_null_terminator() {
        let mut p = printer(PrinterConfig {
            null: true,
            ..PrinterConfig::default()
        });
        p.write_filename("dir/file").unwrap();
        assert_eq!(p.into_inner(), b"dir/file\x00");
    }
}
