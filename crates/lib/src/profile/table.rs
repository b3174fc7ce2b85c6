//! Flag lists shared by the profile rows.

/// Warnings every GCC build enables. `-Werror` makes all of them fatal.
pub(super) const GCC_WARNINGS: &[&str] = &[
  "-Wall",
  "-pedantic",
  "-Wdisabled-optimization",
  "-pedantic-errors",
  "-Wextra",
  "-Wcast-align",
  "-Wcast-qual",
  "-Wchar-subscripts",
  "-Wcomment",
  "-Wconversion",
  "-Werror",
  "-Wfloat-equal",
  "-Wformat",
  "-Wformat=2",
  "-Wformat-nonliteral",
  "-Wformat-security",
  "-Wformat-y2k",
  "-Wimport",
  "-Winit-self",
  "-Winvalid-pch",
  "-Wlong-long",
  "-Wmissing-braces",
  "-Wmissing-field-initializers",
  "-Wmissing-format-attribute",
  "-Wmissing-include-dirs",
  "-Weffc++",
  "-Wpacked",
  "-Wparentheses",
  "-Wpointer-arith",
  "-Wredundant-decls",
  "-Wreturn-type",
  "-Wsequence-point",
  "-Wshadow",
  "-Wsign-compare",
  "-Wstack-protector",
  "-Wstrict-aliasing",
  "-Wstrict-aliasing=2",
  "-Wswitch",
  "-Wswitch-default",
  "-Wswitch-enum",
  "-Wtrigraphs",
  "-Wuninitialized",
  "-Wunknown-pragmas",
  "-Wunreachable-code",
  "-Wunused",
  "-Wunused-function",
  "-Wunused-label",
  "-Wunused-parameter",
  "-Wunused-value",
  "-Wunused-variable",
  "-Wvariadic-macros",
  "-Wvolatile-register-var",
  "-Wwrite-strings",
];

/// Homebrew LLVM rejects a few GCC-only warnings and needs others silenced.
pub(super) const CLANG_WARNINGS: &[&str] = &[
  "-Wall",
  "-pedantic",
  "-Wdisabled-optimization",
  "-pedantic-errors",
  "-Wextra",
  "-Wcast-align",
  "-Wcast-qual",
  "-Wchar-subscripts",
  "-Wcomment",
  "-Wconversion",
  "-Werror",
  "-Wfloat-equal",
  "-Wformat",
  "-Wformat=2",
  "-Wformat-nonliteral",
  "-Wformat-security",
  "-Wformat-y2k",
  "-Wimport",
  "-Winit-self",
  "-Winvalid-pch",
  "-Wlong-long",
  "-Wmissing-braces",
  "-Wmissing-field-initializers",
  "-Wmissing-format-attribute",
  "-Wmissing-include-dirs",
  "-Wpacked",
  "-Wparentheses",
  "-Wpointer-arith",
  "-Wredundant-decls",
  "-Wsequence-point",
  "-Wshadow",
  "-Wsign-compare",
  "-Wstack-protector",
  "-Wstrict-aliasing",
  "-Wstrict-aliasing=2",
  "-Wswitch",
  "-Wswitch-default",
  "-Wswitch-enum",
  "-Wtrigraphs",
  "-Wuninitialized",
  "-Wunknown-pragmas",
  "-Wunreachable-code",
  "-Wunused",
  "-Wunused-function",
  "-Wunused-label",
  "-Wunused-parameter",
  "-Wunused-value",
  "-Wunused-variable",
  "-Wvariadic-macros",
  "-Wwrite-strings",
  "-Wno-return-type-c-linkage",
  "-Wno-header-guard",
  "-Wno-pessimizing-move",
];

/// Applied after the feature flags on every profile.
pub(super) const TUNING: &[&str] = &["-march=native", "-funroll-loops", "-ffast-math"];

pub(super) const HOMEBREW_CLANG: &str = "/opt/homebrew/opt/llvm/bin/clang++";

pub(super) fn owned(flags: &[&str]) -> Vec<String> {
  flags.iter().map(|f| f.to_string()).collect()
}
