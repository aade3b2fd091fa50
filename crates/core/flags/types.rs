/*!
Таблица типов файлов для опции -t.

Имя в нижнем регистре задаёт только расширения; имя с заглавной буквы
дополнительно задаёт регулярное выражение «магических байтов», по
которому файл распознаётся независимо от расширения. Выбор типа
добавляет его расширения в список включения, а магию — в объединение
сигнатур.
*/

/// Один тип файла: расширения через запятую и необязательная сигнатура.
#[derive(Clone, Copy, Debug)]
pub(crate) struct FileType {
    pub name: &'static str,
    pub extensions: &'static str,
    pub magic: Option<&'static str>,
}

const fn ty(name: &'static str, extensions: &'static str) -> FileType {
    FileType { name, extensions, magic: None }
}

const fn ty_magic(
    name: &'static str,
    extensions: &'static str,
    magic: &'static str,
) -> FileType {
    FileType { name, extensions, magic: Some(magic) }
}

/// Вся таблица, в алфавитном порядке имён.
pub(crate) const FILE_TYPES: &[FileType] = &[
    ty("actionscript", "as,mxml"),
    ty("ada", "ada,adb,ads"),
    ty("asm", "asm,s,S"),
    ty("asp", "asp"),
    ty("aspx", "master,ascx,asmx,aspx,svc"),
    ty("autoconf", "ac,in"),
    ty("automake", "am,in"),
    ty("awk", "awk"),
    ty_magic("Awk", "awk", r"#!/.*\Wg?awk(\W.*)?\n"),
    ty("basic", "bas,BAS,cls,frm,ctl,vb,resx"),
    ty("batch", "bat,BAT,cmd,CMD"),
    ty("bison", "y,yy,yxx"),
    ty("c", "c,h,H,hdl,xs"),
    ty("c++", "cpp,CPP,cc,cxx,CXX,h,hh,H,hpp,hxx,Hxx,HXX"),
    ty("clojure", "clj"),
    ty("csharp", "cs"),
    ty("css", "css"),
    ty("csv", "csv"),
    ty("dart", "dart"),
    ty_magic("Dart", "dart", r"#!/.*\Wdart(\W.*)?\n"),
    ty("delphi", "pas,int,dfm,nfm,dof,dpk,dproj,groupproj,bdsgroup,bdsproj"),
    ty("elisp", "el"),
    ty("elixir", "ex,exs"),
    ty("erlang", "erl,hrl"),
    ty("fortran", "for,ftn,fpp,f,F,f77,F77,f90,F90,f95,F95,f03,F03"),
    ty("gif", "gif"),
    ty_magic("Gif", "gif", "GIF87a|GIF89a"),
    ty("go", "go"),
    ty("groovy", "groovy,gtmpl,gpp,grunit,gradle"),
    ty("gsp", "gsp"),
    ty("haskell", "hs,lhs"),
    ty("html", "htm,html,xhtml"),
    ty("jade", "jade"),
    ty("java", "java,properties"),
    ty("jpeg", "jpg,jpeg"),
    ty_magic("Jpeg", "jpg,jpeg", r"\xff\xd8\xff[\xdb\xe0\xe1\xee]"),
    ty("js", "js"),
    ty("json", "json"),
    ty("jsp", "jsp,jspx,jthm,jhtml"),
    ty("julia", "jl"),
    ty("kotlin", "kt,kts"),
    ty("less", "less"),
    ty("lex", "l,ll,lxx"),
    ty("lisp", "lisp,lsp"),
    ty("lua", "lua"),
    ty("m4", "m4"),
    ty("make", "mk,mak,makefile,Makefile,Makefile.Debug,Makefile.Release"),
    ty("markdown", "md"),
    ty("matlab", "m"),
    ty("node", "js"),
    ty_magic("Node", "js", r"#!/.*\Wnode(\W.*)?\n"),
    ty("objc", "m,h"),
    ty("objc++", "mm,h"),
    ty("ocaml", "ml,mli,mll,mly"),
    ty("parrot", "pir,pasm,pmc,ops,pod,pg,tg"),
    ty("pascal", "pas,pp"),
    ty("pdf", "pdf"),
    ty_magic("Pdf", "pdf", r"%PDF-"),
    ty("perl", "pl,PL,pm,pod,t,psgi"),
    ty_magic("Perl", "pl,PL,pm,pod,t,psgi", r"#!/.*\Wperl(\W.*)?\n"),
    ty("php", "php,php3,php4,phtml"),
    ty_magic("Php", "php,php3,php4,phtml", r"#!/.*\Wphp(\W.*)?\n"),
    ty("png", "png"),
    ty_magic("Png", "png", r"\x89PNG\x0d\x0a\x1a\x0a"),
    ty("prolog", "pl,pro"),
    ty("python", "py"),
    ty_magic("Python", "py", r"#!/.*\Wpython(\W.*)?\n"),
    ty("r", "R"),
    ty("rpm", "rpm"),
    ty_magic("Rpm", "rpm", r"\xed\xab\xee\xdb"),
    ty("rst", "rst"),
    ty("rtf", "rtf"),
    ty_magic("Rtf", "rtf", r"\{\\rtf1"),
    ty("ruby", "rb,rhtml,rjs,rxml,erb,rake,spec,Rakefile"),
    ty_magic(
        "Ruby",
        "rb,rhtml,rjs,rxml,erb,rake,spec,Rakefile",
        r"#!/.*\Wruby(\W.*)?\n",
    ),
    ty("rust", "rs"),
    ty("scala", "scala"),
    ty("scheme", "scm,ss"),
    ty("shell", "sh,bash,dash,csh,tcsh,ksh,zsh,fish"),
    ty_magic(
        "Shell",
        "sh,bash,dash,csh,tcsh,ksh,zsh,fish",
        r"#!/.*\W(ba|da|t?c|k|z|fi)?sh(\W.*)?\n",
    ),
    ty("smalltalk", "st"),
    ty("sql", "sql,ctl"),
    ty("svg", "svg"),
    ty("swift", "swift"),
    ty("tcl", "tcl,itcl,itk"),
    ty("tex", "tex,cls,sty,bib"),
    ty("text", "text,txt,TXT,md"),
    ty("tiff", "tif,tiff"),
    ty_magic("Tiff", "tif,tiff", r"\x49\x49\x2a\x00|\x4d\x4d\x00\x2a"),
    ty("tt", "tt,tt2,ttml"),
    ty("typescript", "ts,tsx"),
    ty("verilog", "v,vh,sv"),
    ty("vhdl", "vhd,vhdl"),
    ty("vim", "vim"),
    ty("xml", "xml,xsd,xsl,xslt,wsdl,rss,svg,ent,plist"),
    ty_magic(
        "Xml",
        "xml,xsd,xsl,xslt,wsdl,rss,svg,ent,plist",
        r"<\?xml ",
    ),
    ty("yacc", "y"),
    ty("yaml", "yaml,yml"),
];

/// Найти тип по имени; регистр значим.
pub(crate) fn lookup(name: &str) -> Option<&'static FileType> {
    FILE_TYPES.iter().find(|ty| ty.name == name)
}

/// Напечатать таблицу типов в stderr (-tlist).
pub(crate) fn print_table() {
    eprintln!(
        "{:>12}   FILE NAME EXTENSIONS (-O) AND FILE SIGNATURE 'MAGIC' \
         BYTES (-M)",
        "FILE TYPE",
    );
    for ty in FILE_TYPES.iter() {
        eprintln!("{:>12} = -O {}", ty.name, ty.extensions);
        if let Some(magic) = ty.magic {
            eprintln!("{:>15} '{}'", "-M", magic);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::lookup;

    #[test]
    fn lowercase_has_no_magic() {
        let ty = lookup("python").unwrap();
        assert_eq!(ty.extensions, "py");
        assert!(ty.magic.is_none());
    }

    #[test]
    fn capitalized_has_magic() {
        let ty = lookup("Python").unwrap();
        assert!(ty.magic.is_some());
    }

    #[test]
    fn unknown_type_is_none() {
        assert!(lookup("cobol-2026").is_none());
    }

    #[test]
    fn magic_patterns_compile() {
        let patterns: Vec<&str> = super::FILE_TYPES
            .iter()
            .filter_map(|ty| ty.magic)
            .collect();
        let magic = unigrep_matcher::MagicMatcher::new(&patterns).unwrap();
        assert!(magic.scan(b"\x89PNG\x0d\x0a\x1a\x0a"));
        assert!(magic.scan(b"#!/bin/sh\n"));
        assert!(magic.scan(b"{\\rtf1\\ansi"));
    }
}
