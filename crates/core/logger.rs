/*!
Простейший логгер для крейта `log`, пишущий в stderr.

Ничего изощрённого здесь не нужно: уровни задаются глобально через
`log::set_max_level` при разборе флагов --debug и --trace, а сам логгер
не фильтрует ничего и тянуть стороннюю реализацию ради этого незачем.
*/

use log::Log;

/// Логгер в stderr без собственной фильтрации.
#[derive(Debug)]
pub(crate) struct Logger(());

/// Единственный экземпляр для установки глобальным логгером.
const LOGGER: &'static Logger = &Logger(());

impl Logger {
    /// Установить логгер глобальным. Ошибка возможна только при
    /// повторной установке.
    pub(crate) fn init() -> Result<(), log::SetLoggerError> {
        log::set_logger(LOGGER)
    }
}

impl Log for Logger {
    fn enabled(&self, _: &log::Metadata<'_>) -> bool {
        // Фильтрует сам крейт log через max_level.
        true
    }

    fn log(&self, record: &log::Record<'_>) {
        match (record.file(), record.line()) {
            (Some(file), Some(line)) => {
                eprintln_locked!(
                    "{}|{}|{}:{}: {}",
                    record.level(),
                    record.target(),
                    file,
                    line,
                    record.args()
                );
            }
            (Some(file), None) => {
                eprintln_locked!(
                    "{}|{}|{}: {}",
                    record.level(),
                    record.target(),
                    file,
                    record.args()
                );
            }
            _ => {
                eprintln_locked!(
                    "{}|{}: {}",
                    record.level(),
                    record.target(),
                    record.args()
                );
            }
        }
    }

    fn flush(&self) {
        // eprintln_locked! сбрасывает буфер при каждом вызове.
    }
}
