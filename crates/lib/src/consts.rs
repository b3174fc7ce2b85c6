//! Crate-wide constants.

/// Name used in log output and generated file headers.
pub const APP_NAME: &str = "n8forge";

/// Default configuration file looked up at the project root.
pub const CONFIG_FILE_NAME: &str = "n8forge.toml";

/// Environment variable whose presence selects the Termux toolchain variant.
pub const TERMUX_MARKER: &str = "TERMUX_VERSION";

/// Environment variable the installed runtime uses to locate its modules.
pub const RUNTIME_PATH_VAR: &str = "N8_PATH";

/// Number of bytes emitted per line in generated byte-array constants.
pub const EMBED_BYTES_PER_LINE: usize = 16;

/// Generated byte-array header the stock installer source includes.
pub const EMBED_CONSTANTS_FILE: &str = "embedded_files.h";

/// Generated `FileMapping` table the stock installer source includes
/// after declaring the struct.
pub const EMBED_TABLE_FILE: &str = "embedded_file_map.cpp";
