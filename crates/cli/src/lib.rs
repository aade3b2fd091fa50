/*!
Крейт unigrep-cli собирает мелкую сантехнику командной строки, которая не
относится ни к поиску, ни к форматированию: буферизированный писатель в
stdout (построчный на терминале, блочный иначе), канал к пейджеру, чтение
вывода внешнего процесса со сбором его stderr и распаковка сжатых файлов
внешними командами.
*/

use std::io::IsTerminal;

pub use crate::{
    decompress::{DecompressionMatcher, DecompressionReader},
    process::{CommandError, CommandReader},
    wtr::{stdout, stdout_buffered_block, stdout_buffered_line, OutputWriter},
};

mod decompress;
mod process;
mod wtr;

/// Подключён ли stdout к терминалу.
///
/// От этого зависят автоматический выбор цвета, стратегия буферизации
/// и запуск пейджера.
pub fn is_tty_stdout() -> bool {
    std::io::stdout().is_terminal()
}
