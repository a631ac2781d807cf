/// How an archive member is routed once its suffix is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Plain Python source (`py`, `pyi`).
    Python,
    /// Jupyter notebook, transcoded to a script before analysis.
    Notebook,
    /// C/C++/CUDA source handled by the classifier.
    CFamily,
    /// Recognized but not analyzed; tallied under a language name.
    Other(&'static str),
}

/// Suffixes handled by the C-family classifier.
pub const C_FAMILY_SUFFIXES: &[&str] = &[
    "c", "h", "c++", "cxx", "hxx", "cpp", "hpp", "hp", "cu", "cuh", "cp", "hh", "cc",
];

/// Lowercased final dot-segment of a member name. Members without a suffix,
/// and dotfiles like `.gitignore`, are not routed anywhere.
pub fn member_suffix(member: &str) -> Option<String> {
    let lower = member.to_lowercase();
    let (stem, suffix) = lower.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    Some(suffix.to_string())
}

/// Route a suffix to an analyzer, a language tally, or nowhere.
pub fn route(suffix: &str) -> Option<FileKind> {
    match suffix {
        "py" | "pyi" => Some(FileKind::Python),
        "ipynb" => Some(FileKind::Notebook),
        s if C_FAMILY_SUFFIXES.contains(&s) => Some(FileKind::CFamily),
        s => other_language(s).map(FileKind::Other),
    }
}

/// Fixed suffix-to-language table for files that are only counted.
pub fn other_language(suffix: &str) -> Option<&'static str> {
    Some(match suffix {
        "pyx" | "pxi" => "Cython",
        "f" | "for" | "f90" => "Fortran",
        "jl" => "Julia",
        "rs" => "Rust",
        "r" | "rdata" | "rmd" => "R",
        "abap" => "ABAP",
        "mat" | "asv" => "MATLAB",
        "m" | "wl" | "nb" => "Mathematica",
        "go" => "Go",
        "ada" => "Ada",
        "java" => "Java",
        "scala" => "Scala",
        "groovy" => "Groovy",
        "kt" | "kts" => "Kotlin",
        "cs" => "C#",
        "fs" => "F#",
        "swift" => "Swift",
        "perl" | "pl" | "pm" => "Perl",
        "rb" => "Ruby",
        "hs" | "lhs" => "Haskell",
        "cbl" | "cob" => "COBOL",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_suffix_lowercases_last_segment() {
        assert_eq!(member_suffix("repo/Main.PY").as_deref(), Some("py"));
        assert_eq!(member_suffix("repo/kernel.CU").as_deref(), Some("cu"));
        assert_eq!(member_suffix("archive.tar.gz").as_deref(), Some("gz"));
    }

    #[test]
    fn test_member_suffix_skips_dotfiles_and_bare_names() {
        assert_eq!(member_suffix(".gitignore"), None);
        assert_eq!(member_suffix("Makefile"), None);
    }

    #[test]
    fn test_route_python_and_notebook() {
        assert_eq!(route("py"), Some(FileKind::Python));
        assert_eq!(route("pyi"), Some(FileKind::Python));
        assert_eq!(route("ipynb"), Some(FileKind::Notebook));
    }

    #[test]
    fn test_route_c_family_suffixes() {
        for suffix in C_FAMILY_SUFFIXES {
            assert_eq!(route(suffix), Some(FileKind::CFamily), "suffix {suffix}");
        }
    }

    #[test]
    fn test_route_language_tally() {
        assert_eq!(route("f90"), Some(FileKind::Other("Fortran")));
        assert_eq!(route("kt"), Some(FileKind::Other("Kotlin")));
        assert_eq!(route("rs"), Some(FileKind::Other("Rust")));
    }

    #[test]
    fn test_route_unknown_suffix_is_ignored() {
        assert_eq!(route("txt"), None);
        assert_eq!(route("md"), None);
    }
}
