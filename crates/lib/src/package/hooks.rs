//! Maintainer scripts and environment registration.
//!
//! `postinst` appends `source /etc/profile.d/<script>.sh` to each shell init
//! file that exists, once, and links the interpreter into the bin link
//! directory. `postrm` undoes both and removes the install tree.

use std::path::Path;

use crate::config::Config;
use crate::consts::RUNTIME_PATH_VAR;

const REGISTER_FN: &str = r#"register_line() {
    file="$1"
    line="$2"
    if [ -f "$file" ] && ! grep -qxF "$line" "$file"; then
        if [ -s "$file" ] && [ -n "$(tail -c 1 "$file")" ]; then
            echo >> "$file"
        fi
        printf '%s\n' "$line" >> "$file"
    fi
}
"#;

const UNREGISTER_FN: &str = r#"unregister_line() {
    file="$1"
    line="$2"
    if [ -f "$file" ]; then
        tmp="$(mktemp)"
        grep -vxF "$line" "$file" > "$tmp" || true
        cat "$tmp" > "$file"
        rm -f "$tmp"
    fi
}
"#;

/// Rendered maintainer and environment scripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookScripts {
  pub postinst: String,
  pub postrm: String,
  /// `/etc/profile.d/<script>.sh`
  pub profile_env: String,
  /// `/etc/fish/conf.d/<script>.fish`
  pub fish_env: String,
  /// Line appended to the shell init files.
  pub registration_line: String,
}

/// Join with `/` regardless of the build host.
fn unix_join(base: &Path, name: &str) -> String {
  let base = base.to_string_lossy().replace('\\', "/");
  format!("{}/{}", base.trim_end_matches('/'), name)
}

fn quote(value: &str) -> String {
  format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\"").replace('$', "\\$"))
}

/// Shell snippet that registers `line` in every file of `files`.
pub fn register_script<P: AsRef<Path>>(files: &[P], line: &str) -> String {
  let mut script = REGISTER_FN.to_string();
  script.push('\n');
  for file in files {
    script.push_str(&format!(
      "register_line {} {}\n",
      quote(&file.as_ref().to_string_lossy()),
      quote(line)
    ));
  }
  script
}

/// Shell snippet that strips `line` from every file of `files`.
pub fn unregister_script<P: AsRef<Path>>(files: &[P], line: &str) -> String {
  let mut script = UNREGISTER_FN.to_string();
  script.push('\n');
  for file in files {
    script.push_str(&format!(
      "unregister_line {} {}\n",
      quote(&file.as_ref().to_string_lossy()),
      quote(line)
    ));
  }
  script
}

impl HookScripts {
  pub fn render(config: &Config) -> Self {
    let pkg = &config.package;
    let install_dir = unix_join(&pkg.install_prefix, &config.project.name);
    let profile_script = format!("/etc/profile.d/{}.sh", pkg.env_script);
    let fish_script = format!("/etc/fish/conf.d/{}.fish", pkg.env_script);
    let target = format!("{}/bin/{}", install_dir, config.project.executable);
    let link = unix_join(&pkg.bin_link_dir, &config.project.executable);
    let registration_line = format!("source {}", profile_script);

    let postinst = format!(
      "#!/bin/sh\nset -e\nexport {var}={install}\n\n{register}\nchmod 755 {profile}\nchmod 755 {fish}\n\nmkdir -p {link_dir}\nln -sf {target} {link}\nchmod 755 {link}\n\necho \"{name} has been installed successfully!\"\nexit 0\n",
      var = RUNTIME_PATH_VAR,
      install = quote(&install_dir),
      register = register_script(pkg.init_files.as_slice(), &registration_line),
      profile = profile_script,
      fish = fish_script,
      link_dir = quote(&pkg.bin_link_dir.to_string_lossy().replace('\\', "/")),
      target = quote(&target),
      link = quote(&link),
      name = config.project.name,
    );

    let postrm = format!(
      "#!/bin/sh\nset -e\n\ncase \"$1\" in\n    remove|purge)\n        ;;\n    *)\n        exit 0\n        ;;\nesac\n\n{unregister}\nrm -f {link}\nrm -rf {install}\n\nexit 0\n",
      unregister = unregister_script(pkg.init_files.as_slice(), &registration_line),
      link = quote(&link),
      install = quote(&install_dir),
    );

    let profile_env = format!("#!/bin/sh\nexport {}={}\n", RUNTIME_PATH_VAR, quote(&install_dir));
    let fish_env = format!("#!/usr/bin/fish\nset -gx {} {}\n", RUNTIME_PATH_VAR, install_dir);

    Self {
      postinst,
      postrm,
      profile_env,
      fish_env,
      registration_line,
    }
  }
}
