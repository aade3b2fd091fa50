/*!
Точка входа в unigrep.
*/

use std::{io::Write, process::ExitCode};

use crate::{
    flags::{Options, ParseResult, SpecialMode},
    haystack::Filters,
    search::{SearchConfig, SearchWorker},
    walk::{Stats, Walker},
};

#[macro_use]
mod messages;

mod flags;
mod haystack;
mod logger;
mod search;
mod walk;

// Сборка с musl означает аллокатор musl, который заметно медленнее
// привычных; на 64-битных целях с musl подключается jemalloc.
#[cfg(all(target_env = "musl", target_pointer_width = "64"))]
#[global_allocator]
static ALLOC: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

fn main() -> ExitCode {
    match run(flags::parse()) {
        Ok(code) => code,
        Err(err) => {
            // Разрыв канала — штатное завершение по соглашению Unix:
            // среда выполнения Rust не настраивает сигнал PIPE, и вместо
            // него приходит ошибка ввода-вывода.
            for cause in err.chain() {
                if let Some(ioerr) = cause.downcast_ref::<std::io::Error>() {
                    if ioerr.kind() == std::io::ErrorKind::BrokenPipe {
                        return ExitCode::from(0);
                    }
                }
            }
            eprintln_locked!("{:#}", err);
            ExitCode::from(2)
        }
    }
}

/// Главная точка входа после разбора аргументов.
///
/// Статус выхода: 0 — было совпадение, 1 — совпадений нет, 2 — ошибка.
/// При -q совпадение даёт 0, даже если позже случались ошибки.
fn run(result: ParseResult) -> anyhow::Result<ExitCode> {
    let opts = match result {
        ParseResult::Err(err) => {
            eprintln_locked!("{:#}", err);
            eprintln_locked!("{}", flags::USAGE);
            return Ok(ExitCode::from(2));
        }
        ParseResult::Special(mode) => return special(mode),
        ParseResult::Ok(opts) => opts,
    };
    let quiet = opts.quiet;
    let matched = search(opts)?;
    // При -q первое совпадение фиксирует успех, какие бы ошибки ни
    // случились после.
    Ok(if matched && (quiet || !messages::errored()) {
        ExitCode::from(0)
    } else if messages::errored() {
        ExitCode::from(2)
    } else {
        ExitCode::from(1)
    })
}

/// Полный цикл поиска: компиляция шаблона, обход входов, статистика.
fn search(mut opts: Options) -> anyhow::Result<bool> {
    let spec =
        opts.pattern_assembler().assemble().map_err(|err| match err {
            unigrep_matcher::Error::Empty => {
                anyhow::anyhow!("{err}\n{}", flags::USAGE)
            }
            err => anyhow::Error::new(err),
        })?;
    // Страж ###-o из файла шаблонов включает режим «только
    // совпадения», если его не исключают контекст, -y или -v.
    if spec.only_matching()
        && !opts.any_line
        && !opts.invert_match
        && opts.after_context == 0
        && opts.before_context == 0
    {
        opts.only_matching = true;
    }
    let matcher = unigrep_matcher::PatternMatcher::new(&spec)
        .map_err(anyhow::Error::new)?;
    let filters = Filters::from_options(&opts)?;
    let palette = opts.color_palette();

    let wtr = match opts.pager {
        Some(ref pager) => unigrep_cli::OutputWriter::pager(pager)
            .map_err(|err| {
                anyhow::anyhow!("не удалось запустить пейджер {pager}: {err}")
            })?,
        None => unigrep_cli::stdout(),
    };
    // Свой вывод читать нельзя; с пейджером вывод идёт в канал и
    // защита не нужна.
    let guard_stdout = !wtr.is_pager();
    let printer = unigrep_printer::Printer::new(
        wtr,
        opts.printer_config(),
        palette,
    );
    let mut worker = SearchWorker::new(
        SearchConfig::from_options(&opts),
        matcher,
        printer,
    );

    let mut stats = Stats::default();
    {
        let mut walker =
            Walker::new(&opts, &filters, &mut worker, &mut stats, guard_stdout);
        if opts.infiles.is_empty() {
            // Рекурсивный режим без аргументов начинает с текущего
            // каталога.
            walker.search_cwd()?;
        } else {
            for infile in opts.infiles.iter() {
                if infile == "-" {
                    walker.search_stdin()?;
                } else {
                    walker.search_argument(infile)?;
                }
                if walker.max_files_reached() {
                    break;
                }
            }
        }
    }

    if opts.stats {
        print_stats(&stats, worker.printer_mut().get_mut())?;
    }
    let mut wtr = worker.into_printer().into_inner();
    wtr.close()?;
    Ok(stats.files_with_matches > 0)
}

/// Специальные режимы, коротко замыкающие поиск.
fn special(mode: SpecialMode) -> anyhow::Result<ExitCode> {
    match mode {
        SpecialMode::Help => {
            writeln!(
                std::io::stdout(),
                "{}",
                flags::generate_help().trim_end()
            )?;
            Ok(ExitCode::from(0))
        }
        SpecialMode::Version => {
            writeln!(std::io::stdout(), "{}", flags::generate_version())?;
            Ok(ExitCode::from(0))
        }
        SpecialMode::TypeList => {
            flags::types::print_table();
            Ok(ExitCode::from(2))
        }
    }
}

/// Напечатать сводку --stats в поток результатов.
fn print_stats<W: Write>(stats: &Stats, mut wtr: W) -> std::io::Result<()> {
    write!(
        wtr,
        "Searched {} file{}",
        stats.files_searched,
        if stats.files_searched == 1 { "" } else { "s" },
    )?;
    if stats.dirs_visited > 0 {
        write!(
            wtr,
            " in {} director{}",
            stats.dirs_visited,
            if stats.dirs_visited == 1 { "y" } else { "ies" },
        )?;
    }
    if stats.files_with_matches > 0 {
        writeln!(
            wtr,
            ": found {} file{} with matches",
            stats.files_with_matches,
            if stats.files_with_matches == 1 { "" } else { "s" },
        )?;
    } else {
        writeln!(wtr, ": found no matches")?;
    }
    Ok(())
}
