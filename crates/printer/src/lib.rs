/*!
Крейт unigrep-printer отвечает за внешний вид результатов поиска.

Здесь живут три вещи: палитра цветов, разобранная из GREP_COLORS;
принтер, который выводит заголовки (имя файла, номер строки и столбца,
смещение в байтах) и отрезки строк с раскраской; и шестнадцатеричный
дампер для двоичных совпадений.

Когда цвет выключен, все префиксы палитры — пустые строки, и вывод
байт в байт совпадает с выводом без раскраски вообще.
*/

pub use crate::{
    color::ColorPalette,
    hex::{HexDumper, HexMode},
    standard::{Printer, PrinterConfig, Role},
};

mod color;
mod hex;
mod standard;
