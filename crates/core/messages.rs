/*!
Макросы диагностики и общее изменяемое состояние процесса.

Состояние здесь отвечает на два вопроса: показывать ли пользователю
предупреждения (опция -s их выключает) и случилась ли за время работы
хотя бы одна ошибка. Поиск не прерывается из-за нечитаемого файла, но
такая ошибка меняет статус выхода на 2 — флаг «ошибки были» проверяется
при завершении. Флаг взводится только если сообщение действительно
показано: с подавленными сообщениями статус выхода остаётся обычным.

Оба флага устанавливаются при разборе аргументов и дальше только
читаются.
*/

use std::sync::atomic::{AtomicBool, Ordering};

/// Когда false, предупреждения не выводятся.
static MESSAGES: AtomicBool = AtomicBool::new(true);
/// Взводится, когда выведено сообщение об ошибке.
static ERRORED: AtomicBool = AtomicBool::new(false);

/// Как eprintln, но с блокировкой stdout от перемешивания строк.
///
/// Блокируется stdout, хотя пишем в stderr: когда оба подключены к
/// одному терминалу, это не даёт диагностике вклиниться в середину
/// строки результатов.
#[macro_export]
macro_rules! eprintln_locked {
    ($($tt:tt)*) => {{
        {
            use std::io::Write;

            let stdout = std::io::stdout().lock();
            let mut stderr = std::io::stderr().lock();
            // Разрыв канала на stderr означает, что нас больше никто не
            // слушает; выходим по общему соглашению Unix.
            if let Err(err) = write!(stderr, "ug: ") {
                if err.kind() == std::io::ErrorKind::BrokenPipe {
                    std::process::exit(0);
                } else {
                    std::process::exit(2);
                }
            }
            if let Err(err) = writeln!(stderr, $($tt)*) {
                if err.kind() == std::io::ErrorKind::BrokenPipe {
                    std::process::exit(0);
                } else {
                    std::process::exit(2);
                }
            }
            drop(stdout);
        }
    }}
}

/// Вывести предупреждение, если сообщения не отключены.
#[macro_export]
macro_rules! message {
    ($($tt:tt)*) => {
        if crate::messages::messages() {
            eprintln_locked!($($tt)*);
        }
    }
}

/// Как message, но дополнительно помечает процесс «ошибочным», что
/// влияет на статус выхода. С подавленными сообщениями ничего не
/// делает.
#[macro_export]
macro_rules! err_message {
    ($($tt:tt)*) => {
        if crate::messages::messages() {
            crate::messages::set_errored();
            eprintln_locked!($($tt)*);
        }
    }
}

/// Показывать ли сообщения.
pub(crate) fn messages() -> bool {
    MESSAGES.load(Ordering::Relaxed)
}

/// Установить, показывать ли сообщения.
pub(crate) fn set_messages(yes: bool) {
    MESSAGES.store(yes, Ordering::Relaxed)
}

/// Была ли хотя бы одна ошибка.
pub(crate) fn errored() -> bool {
    ERRORED.load(Ordering::Relaxed)
}

/// Пометить процесс «ошибочным». Вызывается из макроса `err_message`.
pub(crate) fn set_errored() {
    ERRORED.store(true, Ordering::Relaxed);
}
