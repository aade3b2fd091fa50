/*!
Поисковый рабочий: машина состояний поиска по одному файлу.

Рабочий связывает матчер, источник ввода и принтер. Режимы вывода
разбиваются на пять ветвей, проверяемых по порядку: тихий и списочный
(-q, -l, -L), счётный (-c), «только совпадения» (-o, -N), построчный без
контекста и построчный с контекстом (-A, -B, -C, -y). Первые три
сканируют весь буфер, последние два читают ввод построчно; контекстная
ветвь держит кольцо последних строк для окна -B.
*/

use std::{
    io::{self, Read, Write},
    path::Path,
};

use unigrep_cli::{DecompressionMatcher, DecompressionReader};
use unigrep_matcher::{PatternMatcher, Span};
use unigrep_printer::{HexDumper, HexMode, Printer, Role};
use unigrep_searcher::{is_binary, ContextRing, Encoding, Input};

use crate::flags::{BinaryFiles, Options};

/// Конфигурация поискового рабочего, снятая с опций один раз.
#[derive(Clone, Debug)]
pub(crate) struct SearchConfig {
    pub invert: bool,
    pub count: bool,
    pub no_group: bool,
    pub only_matching: bool,
    pub only_line_number: bool,
    pub quiet: bool,
    pub files_with_match: bool,
    pub files_without_match: bool,
    pub any_line: bool,
    pub after_context: u64,
    pub before_context: u64,
    pub max_count: u64,
    /// -a: любой файл считается текстом.
    pub text: bool,
    /// -X: каждое совпадение шестнадцатерично.
    pub hex: bool,
    /// -W: шестнадцатерично только двоичные совпадения.
    pub with_hex: bool,
    /// -I: двоичные файлы молча пропускаются.
    pub without_matches: bool,
    pub line_number: bool,
    pub break_output: bool,
    pub tab_size: u64,
    pub separator: String,
    pub label: String,
    pub encoding: Encoding,
    pub decompress: bool,
}

impl SearchConfig {
    pub(crate) fn from_options(opts: &Options) -> SearchConfig {
        SearchConfig {
            invert: opts.invert_match,
            count: opts.count,
            no_group: opts.no_group,
            only_matching: opts.only_matching,
            only_line_number: opts.only_line_number,
            quiet: opts.quiet,
            files_with_match: opts.files_with_match,
            files_without_match: opts.files_without_match,
            any_line: opts.any_line,
            after_context: opts.after_context,
            before_context: opts.before_context,
            max_count: opts.max_count,
            text: opts.binary_files == BinaryFiles::Text,
            hex: opts.binary_files == BinaryFiles::Hex,
            with_hex: opts.binary_files == BinaryFiles::WithHex,
            without_matches: opts.binary_files == BinaryFiles::WithoutMatch,
            line_number: opts.line_number,
            break_output: opts.break_output,
            tab_size: opts.tabs,
            separator: opts.separator.clone(),
            label: opts.label.clone(),
            encoding: opts.encoding,
            decompress: opts.decompress,
        }
    }
}

/// Рабочий для поиска во многих файлах подряд.
pub(crate) struct SearchWorker<W: Write> {
    config: SearchConfig,
    matcher: PatternMatcher,
    printer: Printer<W>,
    decomp: DecompressionMatcher,
}

impl<W: Write> SearchWorker<W> {
    pub(crate) fn new(
        config: SearchConfig,
        matcher: PatternMatcher,
        printer: Printer<W>,
    ) -> SearchWorker<W> {
        SearchWorker {
            config,
            matcher,
            printer,
            decomp: DecompressionMatcher::new(),
        }
    }

    /// Забрать принтер (нужно тестам и финальному сбросу буфера).
    pub(crate) fn into_printer(self) -> Printer<W> {
        self.printer
    }

    /// Изменяемая ссылка на принтер.
    pub(crate) fn printer_mut(&mut self) -> &mut Printer<W> {
        &mut self.printer
    }

    /// Сырой читатель файла с учётом распаковки и перекодировки; им же
    /// пользуется проверка магических байтов.
    pub(crate) fn open_raw(&self, path: &Path) -> io::Result<Box<dyn Read>> {
        let rdr: Box<dyn Read> = if self.config.decompress {
            Box::new(DecompressionReader::new(path, &self.decomp)?)
        } else {
            Box::new(std::fs::File::open(path)?)
        };
        Ok(self.config.encoding.wrap(rdr))
    }

    /// Поиск в файле по пути. Возвращает, было ли совпадение.
    pub(crate) fn search_path(
        &mut self,
        path: &Path,
        label: &str,
    ) -> io::Result<bool> {
        let input = if self.config.decompress {
            Input::from_reader(
                Box::new(DecompressionReader::new(path, &self.decomp)?),
                self.config.encoding,
            )
        } else {
            Input::open(path, self.config.encoding)?
        };
        self.search_input(label, input)
    }

    /// Поиск в стандартном вводе.
    pub(crate) fn search_stdin(&mut self) -> io::Result<bool> {
        let label = self.config.label.clone();
        let input = Input::stdin(self.config.encoding);
        self.search_input(&label, input)
    }

    /// Поиск в уже открытом вводе: выбор ветви режима вывода.
    pub(crate) fn search_input(
        &mut self,
        label: &str,
        input: Input,
    ) -> io::Result<bool> {
        let status_only = self.config.quiet
            || self.config.files_with_match
            || self.config.files_without_match;
        let scan_only =
            self.config.only_matching || self.config.only_line_number;
        let plain_lines = self.config.before_context == 0
            && self.config.after_context == 0
            && !self.config.any_line;
        let matched = if status_only {
            self.search_status(label, input)
        } else if self.config.count {
            self.search_count(label, input)
        } else if scan_only {
            self.search_scan(label, input)
        } else if plain_lines {
            self.search_lines(label, input)
        } else {
            self.search_context(label, input)
        }?;
        if (matched || self.config.any_line) && self.config.break_output {
            self.printer.write_break()?;
        }
        Ok(matched)
    }

    /// Режим A: тихий и списочный. Одна проверка на весь буфер.
    fn search_status(&mut self, label: &str, input: Input) -> io::Result<bool> {
        let data = input.into_buffer()?;
        let mut matched =
            find_at(&self.matcher, &data, 0)?.is_some();
        if self.config.invert {
            matched = !matched;
        }
        if !self.config.quiet
            && ((matched && self.config.files_with_match)
                || (!matched && self.config.files_without_match))
        {
            self.printer.write_filename(label)?;
        }
        Ok(matched)
    }

    /// Режим B: счёт. С -v считаются несовпавшие строки, с -g — все
    /// события совпадений, иначе — строки хотя бы с одним совпадением.
    fn search_count(&mut self, label: &str, input: Input) -> io::Result<bool> {
        let cfg = &self.config;
        let mut matches: u64 = 0;
        if cfg.invert {
            let mut lines = input.into_lines();
            let mut line = vec![];
            while lines.read_line(&mut line)? {
                if find_at(&self.matcher, &line, 0)?.is_none() {
                    matches += 1;
                    if cfg.max_count > 0 && matches >= cfg.max_count {
                        break;
                    }
                }
            }
        } else if cfg.no_group {
            let data = input.into_buffer()?;
            let mut pos = 0;
            while let Some(m) = find_at(&self.matcher, &data, pos)? {
                matches += 1;
                if cfg.max_count > 0 && matches >= cfg.max_count {
                    break;
                }
                pos = match next_scan_position(&data, &m) {
                    Some(next) => next,
                    None => break,
                };
            }
        } else {
            let data = input.into_buffer()?;
            let mut index = LineIndex::new();
            let mut counted = 0u64;
            let mut pos = 0;
            while let Some(m) = find_at(&self.matcher, &data, pos)? {
                let lineno = index.lineno_at(&data, m.start);
                if lineno != counted {
                    counted = lineno;
                    matches += 1;
                    if cfg.max_count > 0 && matches >= cfg.max_count {
                        break;
                    }
                }
                pos = match next_scan_position(&data, &m) {
                    Some(next) => next,
                    None => break,
                };
            }
        }
        let name = self.printer.config().with_filename.then_some(label);
        self.printer.write_count(name, matches)?;
        Ok(matches > 0)
    }

    /// Режим C: «только совпадения» (-o) и «только номера строк» (-N).
    /// Совпадения перебираются по всему буферу; первый на строке идёт с
    /// обычным разделителем, последующие — с `+`, продолжения
    /// многострочного совпадения при -n — с `|`.
    fn search_scan(&mut self, label: &str, input: Input) -> io::Result<bool> {
        let SearchWorker {
            ref config, ref matcher, ref mut printer, ..
        } = *self;
        let data = input.into_buffer()?;
        let mut dumper = HexDumper::new();
        let mut matches = 0u64;
        let mut hex = false;
        let mut lineno = 0u64;
        let mut index = LineIndex::new();
        let mut pos = 0;
        let mut separator: &str = &config.separator;
        while let Some(m) = find_at(matcher, &data, pos)? {
            let match_lineno = index.lineno_at(&data, m.start);
            let column =
                column_of(&data[index.line_start()..m.start], config.tab_size);
            separator = if lineno != match_lineno {
                &config.separator
            } else {
                "+"
            };
            if config.no_group || lineno != match_lineno {
                if config.max_count > 0 && matches >= config.max_count {
                    break;
                }
                lineno = match_lineno;
                matches += 1;
                if config.only_line_number {
                    printer.header(
                        Some(label),
                        lineno,
                        column,
                        m.start as u64,
                        separator,
                        true,
                    )?;
                }
            }
            if !config.only_line_number {
                let body = &data[m.start..m.end];
                if config.hex {
                    dumper.dump_with_header(
                        printer,
                        label,
                        lineno,
                        column,
                        HexMode::Match,
                        m.start as u64,
                        body,
                        separator,
                    )?;
                    hex = true;
                } else if !config.text && is_binary(body) {
                    if config.with_hex {
                        if hex {
                            dumper.dump_with_header(
                                printer,
                                label,
                                lineno,
                                column,
                                HexMode::Match,
                                m.start as u64,
                                body,
                                separator,
                            )?;
                        } else {
                            printer.header(
                                Some(label),
                                lineno,
                                column,
                                m.start as u64,
                                separator,
                                true,
                            )?;
                            dumper.dump(
                                printer,
                                HexMode::Match,
                                m.start as u64,
                                body,
                                separator,
                            )?;
                            hex = true;
                        }
                    } else if !config.without_matches {
                        printer.header(
                            Some(label),
                            lineno,
                            column,
                            m.start as u64,
                            separator,
                            false,
                        )?;
                        printer.write_binary_notice(
                            label,
                            Some(body.len() as u64),
                        )?;
                    }
                } else {
                    if hex {
                        dumper.done(printer, separator)?;
                    }
                    hex = false;
                    printer.header(
                        Some(label),
                        lineno,
                        column,
                        m.start as u64,
                        separator,
                        false,
                    )?;
                    if config.line_number {
                        // Многострочное совпадение перепечатывается
                        // построчно с заголовком-продолжением.
                        let mut from = 0;
                        while let Some(i) = memchr_newline(&body[from..]) {
                            let to = from + i;
                            printer.write_span(
                                Role::MatchSelected,
                                &body[from..to + 1],
                            )?;
                            if to + 1 < body.len() {
                                lineno += 1;
                                printer.header(
                                    Some(label),
                                    lineno,
                                    1,
                                    (m.start + to + 1) as u64,
                                    "|",
                                    false,
                                )?;
                            }
                            from = to + 1;
                        }
                        printer.write_span(
                            Role::MatchSelected,
                            &body[from..],
                        )?;
                    } else {
                        printer.write_span(Role::MatchSelected, body)?;
                    }
                    if body.last() != Some(&b'\n') {
                        printer.write_raw(b"\n")?;
                    }
                    printer.flush_if_line_buffered()?;
                }
            }
            pos = match next_scan_position(&data, &m) {
                Some(next) => next,
                None => break,
            };
        }
        if hex {
            dumper.done(printer, separator)?;
        }
        Ok(matches > 0)
    }

    /// Режим D: построчный без контекста.
    fn search_lines(&mut self, label: &str, input: Input) -> io::Result<bool> {
        let SearchWorker {
            ref config, ref matcher, ref mut printer, ..
        } = *self;
        let mut lines = input.into_lines();
        let mut dumper = HexDumper::new();
        let mut line: Vec<u8> = vec![];
        let mut matches = 0u64;
        let mut byte_offset = 0u64;
        let mut lineno = 1u64;
        'file: while lines.read_line(&mut line)? {
            let mut binary = config.hex;
            if !config.text && !config.hex && is_binary(&line) {
                if config.without_matches {
                    // -I: двоичный файл целиком выпадает из вывода.
                    matches = 0;
                    break;
                }
                binary = true;
            }
            if config.invert {
                // -v: строка выводится, когда совпадений нет.
                if find_at(matcher, &line, 0)?.is_none() {
                    if binary && !config.hex && !config.with_hex {
                        printer.write_binary_notice(label, None)?;
                        matches = 1;
                        break;
                    }
                    printer.header(
                        Some(label),
                        lineno,
                        1,
                        byte_offset,
                        &config.separator,
                        binary,
                    )?;
                    if binary {
                        dumper.dump(
                            printer,
                            HexMode::Line,
                            byte_offset,
                            &line,
                            &config.separator,
                        )?;
                        dumper.done(printer, &config.separator)?;
                    } else {
                        printer.write_span(Role::Selected, &line)?;
                    }
                    printer.flush_if_line_buffered()?;
                    matches += 1;
                    if config.max_count > 0 && matches >= config.max_count {
                        break;
                    }
                }
            } else {
                let mut last: Option<usize> = None;
                let mut pos = 0;
                while let Some(m) = find_at(matcher, &line, pos)? {
                    if last.is_none()
                        && binary
                        && !config.hex
                        && !config.with_hex
                    {
                        printer.write_binary_notice(label, None)?;
                        matches = 1;
                        break 'file;
                    }
                    let column = column_of(&line[..m.start], config.tab_size);
                    if config.no_group {
                        // -g: каждое совпадение перепечатывает строку.
                        let sep: &str = if last.is_none() {
                            &config.separator
                        } else {
                            "+"
                        };
                        printer.header(
                            Some(label),
                            lineno,
                            column,
                            byte_offset + m.start as u64,
                            sep,
                            binary,
                        )?;
                        if binary {
                            dumper.dump(
                                printer,
                                HexMode::Line,
                                byte_offset,
                                &line[..m.start],
                                "+",
                            )?;
                            dumper.dump(
                                printer,
                                HexMode::Match,
                                byte_offset + m.start as u64,
                                &line[m.start..m.end],
                                "+",
                            )?;
                            dumper.dump(
                                printer,
                                HexMode::Line,
                                byte_offset + m.end as u64,
                                &line[m.end..],
                                "+",
                            )?;
                            dumper.done(printer, "+")?;
                        } else {
                            printer
                                .write_span(Role::Selected, &line[..m.start])?;
                            printer.write_span(
                                Role::MatchSelected,
                                &line[m.start..m.end],
                            )?;
                            printer
                                .write_span(Role::Selected, &line[m.end..])?;
                        }
                        matches += 1;
                        if config.max_count > 0
                            && matches >= config.max_count
                        {
                            break 'file;
                        }
                    } else {
                        if last.is_none() {
                            printer.header(
                                Some(label),
                                lineno,
                                column,
                                byte_offset,
                                &config.separator,
                                binary,
                            )?;
                            matches += 1;
                            last = Some(0);
                        }
                        let from = last.unwrap_or(0);
                        if binary {
                            dumper.dump(
                                printer,
                                HexMode::Line,
                                byte_offset + from as u64,
                                &line[from..m.start],
                                &config.separator,
                            )?;
                            dumper.dump(
                                printer,
                                HexMode::Match,
                                byte_offset + m.start as u64,
                                &line[m.start..m.end],
                                &config.separator,
                            )?;
                        } else {
                            printer.write_span(
                                Role::Selected,
                                &line[from..m.start],
                            )?;
                            printer.write_span(
                                Role::MatchSelected,
                                &line[m.start..m.end],
                            )?;
                        }
                    }
                    last = Some(m.end);
                    // После пустого совпадения строка дальше не
                    // сканируется.
                    if m.is_empty() {
                        break;
                    }
                    pos = m.end;
                }
                if let Some(from) = last {
                    if !config.no_group {
                        if binary {
                            dumper.dump(
                                printer,
                                HexMode::Line,
                                byte_offset + from as u64,
                                &line[from..],
                                &config.separator,
                            )?;
                            dumper.done(printer, &config.separator)?;
                        } else {
                            printer
                                .write_span(Role::Selected, &line[from..])?;
                        }
                    }
                    printer.flush_if_line_buffered()?;
                }
                if config.max_count > 0 && matches >= config.max_count {
                    break;
                }
            }
            byte_offset += line.len() as u64;
            lineno += 1;
        }
        Ok(matches > 0)
    }

    /// Режим E: построчный с контекстом (-A, -B, -C) или -y.
    fn search_context(
        &mut self,
        label: &str,
        input: Input,
    ) -> io::Result<bool> {
        let SearchWorker {
            ref config, ref matcher, ref mut printer, ..
        } = *self;
        let mut lines = input.into_lines();
        let mut ring = ContextRing::new(config.before_context as usize);
        let mut dumper = HexDumper::new();
        let mut matches = 0u64;
        let mut byte_offset = 0u64;
        let mut lineno = 1u64;
        // Последняя выбранная строка: от неё отсчитываются окно -A и
        // нижняя граница окна -B.
        let mut after = 0u64;
        let mut before = 0u64;
        'file: loop {
            {
                let slot = ring.slot_mut(lineno);
                slot.offset = byte_offset;
                slot.binary = config.hex;
                if !lines.read_line(&mut slot.buf)? {
                    break;
                }
            }
            let cur_binary = {
                let slot = ring.slot_mut(lineno);
                if !config.text && !config.hex && is_binary(&slot.buf) {
                    if config.without_matches {
                        matches = 0;
                        break;
                    }
                    slot.binary = true;
                }
                slot.binary
            };
            let cur_len = ring.slot(lineno).buf.len();
            let mut after_pending = config.after_context > 0;
            let mut before_pending = config.before_context > 0;
            if config.invert {
                // -v: совпавшие строки могут выводиться как контекст.
                let line = &ring.slot(lineno).buf;
                let mut found = false;
                let mut last: Option<usize> = None;
                let mut pos = 0;
                while let Some(m) = find_at(matcher, line, pos)? {
                    let in_window = config.any_line
                        || (after > 0
                            && after + config.after_context >= lineno);
                    if !in_window {
                        found = true;
                        break;
                    }
                    if last.is_none() {
                        printer.header(
                            Some(label),
                            lineno,
                            column_of(&line[..m.start], config.tab_size),
                            byte_offset,
                            "-",
                            cur_binary,
                        )?;
                        last = Some(0);
                    }
                    let from = last.unwrap_or(0);
                    if cur_binary {
                        dumper.dump(
                            printer,
                            HexMode::ContextLine,
                            byte_offset + from as u64,
                            &line[from..m.start],
                            "-",
                        )?;
                    } else {
                        printer.write_span(
                            Role::Context,
                            &line[from..m.start],
                        )?;
                    }
                    last = Some(m.end);
                    if m.is_empty() {
                        break;
                    }
                    if cur_binary {
                        dumper.dump(
                            printer,
                            HexMode::ContextMatch,
                            byte_offset + m.start as u64,
                            &line[m.start..m.end],
                            "-",
                        )?;
                    } else {
                        printer.write_span(
                            Role::MatchContext,
                            &line[m.start..m.end],
                        )?;
                    }
                    pos = m.end;
                }
                if let Some(from) = last {
                    if cur_binary {
                        dumper.dump(
                            printer,
                            HexMode::ContextLine,
                            byte_offset + from as u64,
                            &line[from..],
                            "-",
                        )?;
                        dumper.done(printer, "-")?;
                    } else {
                        printer.write_span(Role::Context, &line[from..])?;
                    }
                } else if !found {
                    if cur_binary && !config.hex && !config.with_hex {
                        printer.write_binary_notice(label, None)?;
                        matches = 1;
                        break;
                    }
                    emit_group_separator(
                        printer, config, matches, lineno, after, before,
                    )?;
                    if after_pending {
                        after = lineno;
                    }
                    if before_pending {
                        let begin = window_begin(config, lineno, before);
                        for ctx_lineno in begin..lineno {
                            let ctx = ring.slot(ctx_lineno);
                            emit_inverted_context_line(
                                printer, &mut dumper, matcher, config,
                                label, ctx_lineno, &ctx.buf, ctx.offset,
                                ctx.binary,
                            )?;
                        }
                        before = lineno;
                    }
                    printer.header(
                        Some(label),
                        lineno,
                        1,
                        byte_offset,
                        &config.separator,
                        cur_binary,
                    )?;
                    let line = &ring.slot(lineno).buf;
                    if cur_binary {
                        dumper.dump(
                            printer,
                            HexMode::Line,
                            byte_offset,
                            line,
                            &config.separator,
                        )?;
                        dumper.done(printer, &config.separator)?;
                    } else {
                        printer.write_span(Role::Selected, line)?;
                    }
                    printer.flush_if_line_buffered()?;
                    matches += 1;
                    if config.max_count > 0 && matches >= config.max_count {
                        break;
                    }
                }
            } else {
                let line = &ring.slot(lineno).buf;
                let mut last: Option<usize> = None;
                let mut pos = 0;
                while let Some(m) = find_at(matcher, line, pos)? {
                    if last.is_none()
                        && cur_binary
                        && !config.hex
                        && !config.with_hex
                    {
                        printer.write_binary_notice(label, None)?;
                        matches = 1;
                        break 'file;
                    }
                    if after_pending || before_pending {
                        emit_group_separator(
                            printer, config, matches, lineno, after, before,
                        )?;
                    }
                    if after_pending {
                        after = lineno;
                        after_pending = false;
                    }
                    if before_pending {
                        let begin = window_begin(config, lineno, before);
                        for ctx_lineno in begin..lineno {
                            let ctx = ring.slot(ctx_lineno);
                            printer.header(
                                Some(label),
                                ctx_lineno,
                                1,
                                ctx.offset,
                                "-",
                                ctx.binary,
                            )?;
                            if ctx.binary {
                                dumper.dump(
                                    printer,
                                    HexMode::ContextLine,
                                    ctx.offset,
                                    &ctx.buf,
                                    "-",
                                )?;
                                dumper.done(printer, "-")?;
                            } else {
                                printer
                                    .write_span(Role::Context, &ctx.buf)?;
                            }
                        }
                        before = lineno;
                        before_pending = false;
                    }
                    let column = column_of(&line[..m.start], config.tab_size);
                    if config.no_group {
                        let sep: &str = if last.is_none() {
                            &config.separator
                        } else {
                            "+"
                        };
                        printer.header(
                            Some(label),
                            lineno,
                            column,
                            byte_offset + m.start as u64,
                            sep,
                            cur_binary,
                        )?;
                        if cur_binary {
                            dumper.dump(
                                printer,
                                HexMode::Line,
                                byte_offset,
                                &line[..m.start],
                                "+",
                            )?;
                            dumper.dump(
                                printer,
                                HexMode::Match,
                                byte_offset + m.start as u64,
                                &line[m.start..m.end],
                                "+",
                            )?;
                            dumper.dump(
                                printer,
                                HexMode::Line,
                                byte_offset + m.end as u64,
                                &line[m.end..],
                                "+",
                            )?;
                            dumper.done(printer, "+")?;
                        } else {
                            printer
                                .write_span(Role::Selected, &line[..m.start])?;
                            printer.write_span(
                                Role::MatchSelected,
                                &line[m.start..m.end],
                            )?;
                            printer
                                .write_span(Role::Selected, &line[m.end..])?;
                        }
                        matches += 1;
                        if config.max_count > 0
                            && matches >= config.max_count
                        {
                            break 'file;
                        }
                    } else {
                        if last.is_none() {
                            printer.header(
                                Some(label),
                                lineno,
                                column,
                                byte_offset,
                                &config.separator,
                                cur_binary,
                            )?;
                            matches += 1;
                            last = Some(0);
                        }
                        let from = last.unwrap_or(0);
                        if cur_binary {
                            dumper.dump(
                                printer,
                                HexMode::Line,
                                byte_offset + from as u64,
                                &line[from..m.start],
                                &config.separator,
                            )?;
                            dumper.dump(
                                printer,
                                HexMode::Match,
                                byte_offset + m.start as u64,
                                &line[m.start..m.end],
                                &config.separator,
                            )?;
                        } else {
                            printer.write_span(
                                Role::Selected,
                                &line[from..m.start],
                            )?;
                            printer.write_span(
                                Role::MatchSelected,
                                &line[m.start..m.end],
                            )?;
                        }
                    }
                    last = Some(m.end);
                    if m.is_empty() {
                        break;
                    }
                    pos = m.end;
                }
                if let Some(from) = last {
                    if !config.no_group {
                        if cur_binary {
                            dumper.dump(
                                printer,
                                HexMode::Line,
                                byte_offset + from as u64,
                                &line[from..],
                                &config.separator,
                            )?;
                            dumper.done(printer, &config.separator)?;
                        } else {
                            printer
                                .write_span(Role::Selected, &line[from..])?;
                        }
                    }
                    printer.flush_if_line_buffered()?;
                } else if config.any_line
                    || (after > 0 && after + config.after_context >= lineno)
                {
                    // Строка в хвостовом окне предыдущего совпадения.
                    printer.header(
                        Some(label),
                        lineno,
                        1,
                        byte_offset,
                        "-",
                        cur_binary,
                    )?;
                    if cur_binary {
                        dumper.dump(
                            printer,
                            HexMode::ContextLine,
                            byte_offset,
                            line,
                            "-",
                        )?;
                        dumper.done(printer, "-")?;
                    } else {
                        printer.write_span(Role::Context, line)?;
                    }
                }
                if config.max_count > 0 && matches >= config.max_count {
                    break;
                }
            }
            byte_offset += cur_len as u64;
            lineno += 1;
        }
        Ok(matches > 0)
    }
}

/// Нижняя граница окна -B для строки `lineno`.
fn window_begin(config: &SearchConfig, lineno: u64, before: u64) -> u64 {
    let mut begin = before + 1;
    if lineno > config.before_context
        && begin < lineno - config.before_context
    {
        begin = lineno - config.before_context;
    }
    begin
}

/// Вывести разделитель групп, если между последней напечатанной строкой
/// и началом новой группы остались непоказанные строки.
fn emit_group_separator<W: Write>(
    printer: &mut Printer<W>,
    config: &SearchConfig,
    matches: u64,
    lineno: u64,
    after: u64,
    before: u64,
) -> io::Result<()> {
    if matches == 0 {
        return Ok(());
    }
    let begin = if config.before_context > 0 {
        window_begin(config, lineno, before)
    } else {
        lineno
    };
    let last_printed = if config.after_context > 0 {
        after + config.after_context
    } else {
        before
    };
    if begin > last_printed + 1 {
        printer.write_group_separator()?;
    }
    Ok(())
}

/// Вывести строку из окна -B в инвертированном режиме: совпадения в ней
/// подсвечиваются как контекстные.
fn emit_inverted_context_line<W: Write>(
    printer: &mut Printer<W>,
    dumper: &mut HexDumper,
    matcher: &PatternMatcher,
    config: &SearchConfig,
    label: &str,
    lineno: u64,
    line: &[u8],
    offset: u64,
    binary: bool,
) -> io::Result<()> {
    let mut last: Option<usize> = None;
    let mut pos = 0;
    while let Some(m) = find_at(matcher, line, pos)? {
        if last.is_none() {
            printer.header(
                Some(label),
                lineno,
                column_of(&line[..m.start], config.tab_size),
                offset,
                "-",
                binary,
            )?;
            last = Some(0);
        }
        let from = last.unwrap_or(0);
        if binary {
            dumper.dump(
                printer,
                HexMode::ContextLine,
                offset + from as u64,
                &line[from..m.start],
                "-",
            )?;
        } else {
            printer.write_span(Role::Context, &line[from..m.start])?;
        }
        last = Some(m.end);
        if m.is_empty() {
            break;
        }
        if binary {
            dumper.dump(
                printer,
                HexMode::ContextMatch,
                offset + m.start as u64,
                &line[m.start..m.end],
                "-",
            )?;
        } else {
            printer
                .write_span(Role::MatchContext, &line[m.start..m.end])?;
        }
        pos = m.end;
    }
    if let Some(from) = last {
        if binary {
            dumper.dump(
                printer,
                HexMode::ContextLine,
                offset + from as u64,
                &line[from..],
                "-",
            )?;
            dumper.done(printer, "-")?;
        } else {
            printer.write_span(Role::Context, &line[from..])?;
        }
    }
    Ok(())
}

/// Поиск с данной позиции; ошибки движка всплывают как ошибки ввода.
///
/// Пустое совпадение сразу за последним переводом строки (или в пустом
/// вводе) не засчитывается: такой строки в файле нет, это позиция после
/// неё.
fn find_at(
    matcher: &PatternMatcher,
    haystack: &[u8],
    at: usize,
) -> io::Result<Option<Span>> {
    match matcher.find_at(haystack, at).map_err(io::Error::other)? {
        Some(m)
            if m.is_empty()
                && m.start == haystack.len()
                && haystack.last().map_or(true, |&b| b == b'\n') =>
        {
            Ok(None)
        }
        found => Ok(found),
    }
}

/// Позиция продолжения перебора по всему буферу. После принятого
/// пустого совпадения остаток его строки не сканируется: поиск
/// переходит к началу следующей строки, а в последней строке
/// завершается.
fn next_scan_position(data: &[u8], m: &Span) -> Option<usize> {
    if m.is_empty() {
        memchr::memchr(b'\n', &data[m.end..]).map(|nl| m.end + nl + 1)
    } else {
        Some(m.end)
    }
}

fn memchr_newline(data: &[u8]) -> Option<usize> {
    memchr::memchr(b'\n', data)
}

/// Номер столбца (с единицы) для позиции в строке: табуляция двигает
/// счётчик к следующему кратному её ширины, многобайтовые символы
/// считаются за один.
fn column_of(prefix: &[u8], tab_size: u64) -> u64 {
    let mut column: u64 = 0;
    for &byte in prefix {
        if byte == b'\t' {
            column = (column / tab_size + 1) * tab_size;
        } else if byte & 0xC0 != 0x80 {
            column += 1;
        }
    }
    column + 1
}

/// Счётчик строк по абсолютным смещениям в буфере. Позиции запросов
/// должны не убывать.
struct LineIndex {
    pos: usize,
    lineno: u64,
    line_start: usize,
}

impl LineIndex {
    fn new() -> LineIndex {
        LineIndex { pos: 0, lineno: 1, line_start: 0 }
    }

    /// Номер строки, содержащей данное смещение.
    fn lineno_at(&mut self, data: &[u8], offset: usize) -> u64 {
        for nl in memchr::memchr_iter(b'\n', &data[self.pos..offset]) {
            self.lineno += 1;
            self.line_start = self.pos + nl + 1;
        }
        self.pos = offset;
        self.lineno
    }

    /// Смещение начала строки последнего запроса.
    fn line_start(&self) -> usize {
        self.line_start
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unigrep_matcher::PatternMatcher;
    use unigrep_printer::ColorPalette;

    /// Прогнать поиск по буферу с данными опциями и собрать вывод.
    fn run(opts: &Options, input: &[u8]) -> (String, bool) {
        let mut opts = opts.clone();
        opts.finalize().unwrap();
        let spec = opts.pattern_assembler().assemble().unwrap();
        let matcher = PatternMatcher::new(&spec).unwrap();
        let printer = Printer::new(
            Vec::new(),
            opts.printer_config(),
            ColorPalette::disabled(),
        );
        let mut worker = SearchWorker::new(
            SearchConfig::from_options(&opts),
            matcher,
            printer,
        );
        let label = opts.label.clone();
        let matched = worker
            .search_input(&label, Input::from_bytes(input.to_vec()))
            .unwrap();
        let out = worker.into_printer().into_inner();
        (String::from_utf8_lossy(&out).into_owned(), matched)
    }

    fn opts(tweak: impl FnOnce(&mut Options)) -> Options {
        let mut opts = Options::default();
        tweak(&mut opts);
        opts
    }

    #[test]
    fn line_numbers_for_matching_lines() {
        let o = opts(|o| {
            o.regexp = vec!["foo".to_string()];
            o.line_number = true;
        });
        let (out, matched) = run(&o, b"foo\nbar\nfoo\n");
        assert_eq!(out, "1:foo\n3:foo\n");
        assert!(matched);
    }

    #[test]
    fn count_matching_lines() {
        let o = opts(|o| {
            o.regexp = vec!["foo".to_string()];
            o.count = true;
        });
        let (out, matched) = run(&o, b"foo\nbar\nfoo\n");
        assert_eq!(out, "2\n");
        assert!(matched);
    }

    #[test]
    fn count_match_events_with_no_group() {
        let o = opts(|o| {
            o.regexp = vec!["foo".to_string()];
            o.count = true;
            o.no_group = true;
        });
        let (out, _) = run(&o, b"foo\nbar\nfoo\n");
        assert_eq!(out, "2\n");
        // Два события на одной строке считаются оба.
        let (out, _) = run(&o, b"foofoo\n");
        assert_eq!(out, "2\n");
    }

    #[test]
    fn invert_selects_non_matching_lines() {
        let o = opts(|o| {
            o.regexp = vec!["foo".to_string()];
            o.invert_match = true;
            o.line_number = true;
        });
        let (out, matched) = run(&o, b"foo\nbar\nfoo\n");
        assert_eq!(out, "2:bar\n");
        assert!(matched);
    }

    #[test]
    fn after_context_without_gap_has_no_separator() {
        let o = opts(|o| {
            o.regexp = vec!["X".to_string()];
            o.after_context = 1;
            o.line_number = true;
        });
        let (out, _) = run(&o, b"aX\nbb\ncX\nddd\neX\n");
        assert_eq!(out, "1:aX\n2-bb\n3:cX\n4-ddd\n5:eX\n");
    }

    #[test]
    fn after_context_with_gap_emits_separator() {
        let o = opts(|o| {
            o.regexp = vec!["X".to_string()];
            o.after_context = 1;
            o.line_number = true;
        });
        let (out, _) = run(&o, b"aX\nbb\ncc\ndd\neX\n");
        assert_eq!(out, "1:aX\n2-bb\n--\n5:eX\n");
    }

    #[test]
    fn before_context_pulls_lines_from_ring() {
        let o = opts(|o| {
            o.regexp = vec!["X".to_string()];
            o.before_context = 2;
            o.line_number = true;
        });
        let (out, _) = run(&o, b"a\nb\nc\ndX\ne\n");
        assert_eq!(out, "2-b\n3-c\n4:dX\n");
    }

    #[test]
    fn context_separator_can_be_suppressed() {
        let o = opts(|o| {
            o.regexp = vec!["X".to_string()];
            o.after_context = 1;
            o.group_separator = None;
        });
        let (out, _) = run(&o, b"aX\nbb\ncc\ndd\neX\n");
        assert_eq!(out, "aX\nbb\neX\n");
    }

    #[test]
    fn binary_file_is_reported_once() {
        let o = opts(|o| o.regexp = vec!["world".to_string()]);
        let (out, matched) = run(&o, b"hello\x00world\n");
        assert_eq!(out, "Binary file (standard input) matches\n");
        assert!(matched);
    }

    #[test]
    fn binary_as_text_prints_the_line() {
        let o = opts(|o| {
            o.regexp = vec!["world".to_string()];
            o.binary_files = BinaryFiles::Text;
        });
        let (out, _) = run(&o, b"hello\x00world\n");
        assert_eq!(out, "hello\x00world\n");
    }

    #[test]
    fn binary_without_match_suppresses_output() {
        let o = opts(|o| {
            o.regexp = vec!["world".to_string()];
            o.binary_files = BinaryFiles::WithoutMatch;
        });
        let (out, matched) = run(&o, b"hello\x00world\n");
        assert_eq!(out, "");
        assert!(!matched);
    }

    #[test]
    fn hex_mode_dumps_matched_line() {
        let o = opts(|o| {
            o.regexp = vec!["world".to_string()];
            o.binary_files = BinaryFiles::Hex;
        });
        let (out, matched) = run(&o, b"hello\x00world\n");
        assert_eq!(
            out,
            "00000000: 68 65 6c 6c 6f 00 77 6f 72 6c 64 0a -- -- -- --  \
             hello world ----\n",
        );
        assert!(matched);
    }

    #[test]
    fn only_matching_prints_match_bodies() {
        let o = opts(|o| {
            o.regexp = vec!["fo+".to_string()];
            o.only_matching = true;
        });
        let (out, _) = run(&o, b"xfooy\nz\nfo\n");
        assert_eq!(out, "foo\nfo\n");
    }

    #[test]
    fn only_matching_repeats_on_same_line() {
        let o = opts(|o| {
            o.regexp = vec!["o".to_string()];
            o.only_matching = true;
            o.line_number = true;
        });
        let (out, _) = run(&o, b"oo\n");
        assert_eq!(out, "1:o\n1+o\n");
    }

    #[test]
    fn only_line_number_prints_headers_once_per_line() {
        let o = opts(|o| {
            o.regexp = vec!["o".to_string()];
            o.only_line_number = true;
        });
        let (out, _) = run(&o, b"oo\nx\no\n");
        assert_eq!(out, "1:\n3:\n");
    }

    #[test]
    fn files_with_match_prints_label() {
        let o = opts(|o| {
            o.regexp = vec!["foo".to_string()];
            o.files_with_match = true;
        });
        let (out, matched) = run(&o, b"a\nfoo\n");
        assert_eq!(out, "(standard input)\n");
        assert!(matched);
        let (out, matched) = run(&o, b"a\nb\n");
        assert_eq!(out, "");
        assert!(!matched);
    }

    #[test]
    fn files_without_match_is_complementary() {
        let o = opts(|o| {
            o.regexp = vec!["foo".to_string()];
            o.files_without_match = true;
        });
        let (out, matched) = run(&o, b"a\nb\n");
        assert_eq!(out, "(standard input)\n");
        assert!(!matched);
    }

    #[test]
    fn quiet_prints_nothing() {
        let o = opts(|o| {
            o.regexp = vec!["foo".to_string()];
            o.quiet = true;
        });
        let (out, matched) = run(&o, b"foo\n");
        assert_eq!(out, "");
        assert!(matched);
    }

    #[test]
    fn max_count_stops_the_file() {
        let o = opts(|o| {
            o.regexp = vec!["a".to_string()];
            o.max_count = 2;
            o.line_number = true;
        });
        let (out, _) = run(&o, b"a\na\na\na\n");
        assert_eq!(out, "1:a\n2:a\n");
    }

    #[test]
    fn no_group_reprints_line_per_match() {
        let o = opts(|o| {
            o.regexp = vec!["o".to_string()];
            o.no_group = true;
            o.byte_offset = true;
        });
        let (out, _) = run(&o, b"oo\n");
        // Каждое совпадение печатает строку целиком со своим смещением.
        assert_eq!(out, "0:oo\n1+oo\n");
    }

    #[test]
    fn empty_line_pattern_matches_empty_lines() {
        let o = opts(|o| {
            o.regexp = vec!["^$".to_string()];
            o.line_number = true;
        });
        let (out, matched) = run(&o, b"a\n\nb\n\n");
        assert_eq!(out, "2:\n4:\n");
        assert!(matched);
    }

    #[test]
    fn any_line_prints_everything() {
        let o = opts(|o| {
            o.regexp = vec!["b".to_string()];
            o.any_line = true;
            o.line_number = true;
        });
        let (out, _) = run(&o, b"a\nb\nc\n");
        assert_eq!(out, "1-a\n2:b\n3-c\n");
    }

    #[test]
    fn word_anchored_pattern() {
        let o = opts(|o| {
            o.regexp = vec!["cat".to_string()];
            o.word_regexp = true;
        });
        let (out, _) = run(&o, b"cat\nconcatenate\na cat.\n");
        assert_eq!(out, "cat\na cat.\n");
    }

    #[test]
    fn line_anchored_pattern() {
        let o = opts(|o| {
            o.regexp = vec!["cat".to_string()];
            o.line_regexp = true;
        });
        let (out, _) = run(&o, b"cat\na cat\ncat \n");
        assert_eq!(out, "cat\n");
    }

    #[test]
    fn column_numbers_are_tab_aware() {
        let o = opts(|o| {
            o.regexp = vec!["x".to_string()];
            o.column_number = true;
        });
        let (out, _) = run(&o, b"\tx\n");
        // Табуляция в восемь столбцов: совпадение в девятом.
        assert_eq!(out, "9:\tx\n");
        let mut o = o.clone();
        o.tabs = 4;
        let (out, _) = run(&o, b"\tx\n");
        assert_eq!(out, "5:\tx\n");
    }

    #[test]
    fn byte_offsets_count_from_file_start() {
        let o = opts(|o| {
            o.regexp = vec!["b".to_string()];
            o.byte_offset = true;
        });
        let (out, _) = run(&o, b"aaa\nb\n");
        assert_eq!(out, "4:b\n");
    }

    #[test]
    fn last_line_without_newline_is_matched() {
        let o = opts(|o| o.regexp = vec!["bar".to_string()]);
        let (out, _) = run(&o, b"foo\nbar");
        assert_eq!(out, "bar");
    }

    #[test]
    fn empty_match_stops_scanning_the_line_in_only_matching() {
        // -Y с обнуляемым шаблоном: на строку без `x` приходится ровно
        // одна запись пустого совпадения, а не по записи на каждый байт.
        let o = opts(|o| {
            o.regexp = vec!["x*".to_string()];
            o.empty = true;
            o.only_matching = true;
            o.line_number = true;
        });
        let (out, matched) = run(&o, b"aaa\n");
        assert_eq!(out, "1:\n");
        assert!(matched);
    }

    #[test]
    fn empty_match_counts_once_per_line_with_no_group() {
        let o = opts(|o| {
            o.regexp = vec!["x*".to_string()];
            o.empty = true;
            o.count = true;
            o.no_group = true;
        });
        let (out, _) = run(&o, b"aaa\nbbb\n");
        assert_eq!(out, "2\n");
    }

    #[test]
    fn multiline_only_matching_splits_with_continuation() {
        // Шаблон, пересекающий перевод строки: тело перепечатывается
        // построчно, продолжения идут с разделителем `|`.
        let o = opts(|o| {
            o.regexp = vec!["b(?s:.)c".to_string()];
            o.only_matching = true;
            o.line_number = true;
        });
        let (out, _) = run(&o, b"ab\nca\n");
        assert_eq!(out, "1:b\n2|c\n");
    }

    #[test]
    fn column_of_counts_multibyte_once() {
        assert_eq!(column_of("αβ".as_bytes(), 8), 3);
        assert_eq!(column_of(b"", 8), 1);
        assert_eq!(column_of(b"ab\t", 4), 5);
    }
}
