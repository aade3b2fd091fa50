/*!
Шестнадцатеричный дампер для двоичных совпадений.

Дампер накапливает строку из шестнадцати пар «режим + байт», адресуя
ячейку младшими четырьмя битами смещения, и сбрасывает её в вид

```text
<смещение>: <16 байтов шестнадцатерично>  <16 печатных символов>
```

Пропуски в строке показываются как `--` и `-`, управляющие байты — в
инверсном видео. Строка сбрасывается при заполнении, при разрыве
смещений и в конце файла.
*/

use std::io::Write;

use crate::standard::Printer;

/// Происхождение байта в дампе; выбирает цвет ячейки.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HexMode {
    /// Байт совпадения в выбранной строке.
    Match,
    /// Байт выбранной строки вне совпадения.
    Line,
    /// Байт совпадения в контекстной строке.
    ContextMatch,
    /// Байт контекстной строки вне совпадения.
    ContextLine,
}

/// Накопитель одной строки дампа и курсор последнего смещения.
#[derive(Clone, Debug)]
pub struct HexDumper {
    cells: [Option<(HexMode, u8)>; 16],
    last_offset: u64,
}

impl Default for HexDumper {
    fn default() -> HexDumper {
        HexDumper::new()
    }
}

impl HexDumper {
    /// Свежий дампер; заводится по одному на каждый просмотренный файл.
    pub fn new() -> HexDumper {
        HexDumper { cells: [None; 16], last_offset: 0 }
    }

    /// Выгрузить кусок данных в построчных режимах: смещение задаёт
    /// вызывающий, заголовок уже выведен им же.
    pub fn dump<W: Write>(
        &mut self,
        printer: &mut Printer<W>,
        mode: HexMode,
        offset: u64,
        data: &[u8],
        sep: &str,
    ) -> std::io::Result<()> {
        self.last_offset = offset;
        self.fill(printer, mode, data, sep)
    }

    /// Выгрузить совпадение в режиме сканирования всего буфера (-o):
    /// на разрыве смещений дампер сам завершает неполную строку и
    /// выводит заголовок следующего совпадения.
    pub fn dump_with_header<W: Write>(
        &mut self,
        printer: &mut Printer<W>,
        name: &str,
        lineno: u64,
        column: u64,
        mode: HexMode,
        offset: u64,
        data: &[u8],
        sep: &str,
    ) -> std::io::Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        if self.last_offset == 0 || self.last_offset < offset {
            if self.last_offset & 0xf != 0 {
                self.render_row(printer, sep)?;
            }
            printer.header(Some(name), lineno, column, offset, sep, true)?;
        }
        self.last_offset = offset;
        self.fill(printer, mode, data, sep)
    }

    /// Завершить дамп: сбросить неполную строку, если она накопилась.
    pub fn done<W: Write>(
        &mut self,
        printer: &mut Printer<W>,
        sep: &str,
    ) -> std::io::Result<()> {
        if self.last_offset & 0xf != 0 {
            self.render_row(printer, sep)?;
        }
        Ok(())
    }

    fn fill<W: Write>(
        &mut self,
        printer: &mut Printer<W>,
        mode: HexMode,
        data: &[u8],
        sep: &str,
    ) -> std::io::Result<()> {
        for &byte in data {
            self.cells[(self.last_offset & 0xf) as usize] =
                Some((mode, byte));
            self.last_offset += 1;
            if self.last_offset & 0xf == 0 {
                self.render_row(printer, sep)?;
            }
        }
        Ok(())
    }

    /// Отрисовать накопленную строку дампа и очистить ячейки.
    fn render_row<W: Write>(
        &mut self,
        printer: &mut Printer<W>,
        sep: &str,
    ) -> std::io::Result<()> {
        let row_offset = (self.last_offset - 1) & !0xf;
        let offset_color = printer.colors().offset().to_string();
        let context_color = printer.colors().context().to_string();
        let reset = printer.colors().reset().to_string();
        let color_enabled = printer.colors().is_enabled();

        printer.write_raw(offset_color.as_bytes())?;
        printer.write_raw(format!("{row_offset:08x}").as_bytes())?;
        printer.write_raw(reset.as_bytes())?;
        printer.write_separator(sep)?;
        printer.write_raw(b" ")?;

        for cell in self.cells.iter() {
            match *cell {
                None => {
                    printer.write_raw(context_color.as_bytes())?;
                    printer.write_raw(b" --")?;
                    printer.write_raw(reset.as_bytes())?;
                }
                Some((mode, byte)) => {
                    printer
                        .write_raw(self.mode_color(printer, mode).as_bytes())?;
                    printer.write_raw(format!(" {byte:02x}").as_bytes())?;
                    printer.write_raw(reset.as_bytes())?;
                }
            }
        }

        printer.write_raw(b"  ")?;

        for cell in self.cells.iter() {
            match *cell {
                None => {
                    printer.write_raw(context_color.as_bytes())?;
                    printer.write_raw(b"-")?;
                    printer.write_raw(reset.as_bytes())?;
                }
                Some((mode, byte)) => {
                    printer
                        .write_raw(self.mode_color(printer, mode).as_bytes())?;
                    if byte < 0x20 && color_enabled {
                        printer.write_raw(b"\x1b[7m")?;
                        printer.write_raw(&[b'@' + byte])?;
                    } else if byte == 0x7f && color_enabled {
                        printer.write_raw(b"\x1b[7m~")?;
                    } else if byte < 0x20 || byte >= 0x7f {
                        printer.write_raw(b" ")?;
                    } else {
                        printer.write_raw(&[byte])?;
                    }
                    printer.write_raw(reset.as_bytes())?;
                }
            }
        }

        printer.write_raw(b"\n")?;
        printer.flush_if_line_buffered()?;
        self.cells = [None; 16];
        Ok(())
    }

    fn mode_color<W: Write>(
        &self,
        printer: &Printer<W>,
        mode: HexMode,
    ) -> String {
        match mode {
            HexMode::Match => printer.colors().matched_selected(),
            HexMode::Line => printer.colors().selected(),
            HexMode::ContextMatch => printer.colors().matched_context(),
            HexMode::ContextLine => printer.colors().context(),
        }
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{color::ColorPalette, standard::PrinterConfig};

    fn printer() -> Printer<Vec<u8>> {
        Printer::new(
            vec![],
            PrinterConfig::default(),
            ColorPalette::disabled(),
        )
    }

    #[test]
    fn single_row_with_gap_at_tail() {
        let mut p = printer();
        let mut dumper = HexDumper::new();
        dumper.dump(&mut p, HexMode::Match, 0, b"world", ":").unwrap();
        dumper.done(&mut p, ":").unwrap();
        assert_eq!(
            String::from_utf8(p.into_inner()).unwrap(),
            "00000000: 77 6f 72 6c 64 -- -- -- -- -- -- -- -- -- -- --  \
             world-----------\n",
        );
    }

    #[test]
    fn full_rows_flush_automatically() {
        let mut p = printer();
        let mut dumper = HexDumper::new();
        let data: Vec<u8> = (0x41..0x51).collect();
        dumper.dump(&mut p, HexMode::Line, 0, &data, ":").unwrap();
        // Ровно шестнадцать байтов: строка сброшена без done().
        let out = String::from_utf8(p.into_inner()).unwrap();
        assert_eq!(
            out,
            "00000000: 41 42 43 44 45 46 47 48 49 4a 4b 4c 4d 4e 4f 50  \
             ABCDEFGHIJKLMNOP\n",
        );
    }

    #[test]
    fn mid_file_offset_fills_leading_gap() {
        let mut p = printer();
        let mut dumper = HexDumper::new();
        dumper.dump(&mut p, HexMode::Match, 0x12, b"ab", ":").unwrap();
        dumper.done(&mut p, ":").unwrap();
        assert_eq!(
            String::from_utf8(p.into_inner()).unwrap(),
            "00000010: -- -- 61 62 -- -- -- -- -- -- -- -- -- -- -- --  \
             --ab------------\n",
        );
    }

    #[test]
    fn control_bytes_render_as_blank_without_color() {
        let mut p = printer();
        let mut dumper = HexDumper::new();
        dumper.dump(&mut p, HexMode::Line, 0, b"a\x01b\x7f", ":").unwrap();
        dumper.done(&mut p, ":").unwrap();
        let out = String::from_utf8(p.into_inner()).unwrap();
        // Четыре байта данных и двенадцать ячеек-пропусков.
        assert!(out.ends_with("  a b ------------\n"), "вывод: {out:?}");
    }

    #[test]
    fn header_break_between_distant_matches() {
        let mut p = Printer::new(
            vec![],
            PrinterConfig {
                with_filename: true,
                ..PrinterConfig::default()
            },
            ColorPalette::disabled(),
        );
        let mut dumper = HexDumper::new();
        dumper
            .dump_with_header(
                &mut p, "bin", 1, 1, HexMode::Match, 0x00, b"ab", ":",
            )
            .unwrap();
        dumper
            .dump_with_header(
                &mut p, "bin", 9, 1, HexMode::Match, 0x40, b"cd", ":",
            )
            .unwrap();
        dumper.done(&mut p, ":").unwrap();
        let out = String::from_utf8(p.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        // Заголовок, неполная строка первого совпадения, заголовок,
        // строка второго.
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "bin:");
        assert!(lines[1].starts_with("00000000: 61 62"));
        assert_eq!(lines[2], "bin:");
        assert!(lines[3].starts_with("00000040: 63 64"));
    }
}
