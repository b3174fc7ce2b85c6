//! End-to-end pipeline runs with the real stage planners and a fake runner.

use std::sync::Arc;

use n8forge_lib::execute::{CancelFlag, ErrorKind, SkipReason, StageOutcome, ToolRunner};
use n8forge_lib::pipeline::{BuildRequest, HostSetup, run};
use n8forge_lib::plan::{Directives, SkipDirective};
use n8forge_lib::platform::BuildTarget;
use n8forge_lib::probe::StaticFlags;
use tempfile::TempDir;

use super::common::{FakeRunner, linux, n8_project, windows, write_file};

fn request(temp: &TempDir, target: BuildTarget, directives: Directives) -> BuildRequest {
  BuildRequest {
    project_dir: temp.path().to_path_buf(),
    target: Some(target),
    directives,
    jobs: 2,
    host_machine: Some("x86_64".to_string()),
    ..BuildRequest::default()
  }
}

fn no_flags() -> StaticFlags {
  StaticFlags::new(Vec::<String>::new())
}

fn runner(fake: &Arc<FakeRunner>) -> Arc<dyn ToolRunner> {
  fake.clone()
}

#[tokio::test]
async fn skip_stdlib_builds_executable_and_exits_zero() {
  let temp = TempDir::new().unwrap();
  n8_project(temp.path());
  let fake = FakeRunner::new();
  let directives = Directives {
    skip_stdlib: true,
    ..Directives::default()
  };

  let report = run(request(&temp, linux(), directives), &no_flags(), runner(&fake), CancelFlag::new())
    .await
    .unwrap();

  assert_eq!(report.exit_code(), 0);
  assert!(matches!(report.outcome("n8"), Some(StageOutcome::Succeeded { .. })));
  assert!(temp.path().join("dist/n8lang/bin/n8").is_file());
  assert!(report.outcome("stdlib").is_none());

  let mut pruned: Vec<&str> = report.pruned.iter().map(|p| p.id.as_str()).collect();
  pruned.sort();
  assert_eq!(pruned, vec!["package", "stdlib"]);
  assert!(report.pruned.iter().all(|p| p.directive == SkipDirective::SkipStdlib));
  assert!(!fake.ran("n8-std"));
  assert!(!fake.ran("dpkg-deb"));
}

#[tokio::test]
async fn linux_build_produces_package_and_removes_staging() {
  let temp = TempDir::new().unwrap();
  n8_project(temp.path());
  let fake = FakeRunner::new();

  let report = run(request(&temp, linux(), Directives::default()), &no_flags(), runner(&fake), CancelFlag::new())
    .await
    .unwrap();

  assert!(report.is_success(), "{:?}", report.failed().collect::<Vec<_>>());
  assert_eq!(fake.programs()[0], "git");
  assert!(fake.ran("git submodule update --init --recursive"));
  assert!(fake.ran("-shared"));

  let deb = temp.path().join("dist/n8-lang_1.0.0_amd64.deb");
  assert!(deb.is_file());
  let staging = temp.path().join("dist/deb");
  assert!(report.cleaned.contains(&staging));
  assert!(!staging.exists());
  assert!(temp.path().join("dist/n8lang/modules/core@1.0.0/lib/n8-std.so").is_file());
  assert!(temp.path().join("dist/n8lang/modules/core@1.0.0/src/io.n8").is_file());
}

#[tokio::test]
async fn windows_build_cleans_generated_sources() {
  let temp = TempDir::new().unwrap();
  n8_project(temp.path());
  let fake = FakeRunner::new();
  let mut request = request(&temp, windows(), Directives::default());
  request.host_setup = HostSetup {
    submodules: false,
    install_prereqs: false,
  };

  let report = run(request, &no_flags(), runner(&fake), CancelFlag::new()).await.unwrap();

  assert!(report.is_success(), "{:?}", report.failed().collect::<Vec<_>>());
  assert!(!fake.ran("git"));
  assert!(temp.path().join("dist/n8-lang_1.0.0_amd64.exe").is_file());
  assert!(fake.ran("windres"));

  assert!(report.cleaned.iter().any(|p| p.ends_with("n8-uninstaller-config.res")));
  assert!(report.cleaned.iter().any(|p| p.starts_with(temp.path().join("temp/embed"))));
  for path in &report.cleaned {
    assert!(!path.exists(), "{} should be removed", path.display());
  }
}

#[tokio::test]
async fn failed_stdlib_skips_package_but_keeps_executable() {
  let temp = TempDir::new().unwrap();
  n8_project(temp.path());
  let fake = FakeRunner::failing_on("-shared");

  let report = run(request(&temp, linux(), Directives::default()), &no_flags(), runner(&fake), CancelFlag::new())
    .await
    .unwrap();

  assert_eq!(report.exit_code(), 1);
  assert!(matches!(report.outcome("stdlib"), Some(StageOutcome::Failed(_))));
  assert!(matches!(
    report.outcome("package"),
    Some(StageOutcome::Skipped(SkipReason::DependencyFailed(dep))) if dep.as_str() == "stdlib"
  ));
  assert!(temp.path().join("dist/n8lang/bin/n8").is_file());
}

#[tokio::test]
async fn skip_core_without_previous_outputs_fails_before_tools() {
  let temp = TempDir::new().unwrap();
  n8_project(temp.path());
  let fake = FakeRunner::new();
  let directives = Directives {
    skip_core: true,
    ..Directives::default()
  };

  let err = run(request(&temp, linux(), directives), &no_flags(), runner(&fake), CancelFlag::new())
    .await
    .unwrap_err();

  assert_eq!(err.kind(), ErrorKind::Configuration);
  assert!(fake.calls().is_empty());
}

#[tokio::test]
async fn skip_core_reuses_previous_outputs() {
  let temp = TempDir::new().unwrap();
  n8_project(temp.path());
  write_file(temp.path(), "temp/libn8core.a", b"!<arch>\n");
  write_file(temp.path(), "dist/n8lang/bin/n8", b"\x7fELF");
  let fake = FakeRunner::new();
  let directives = Directives {
    skip_core: true,
    ..Directives::default()
  };

  let report = run(request(&temp, linux(), directives), &no_flags(), runner(&fake), CancelFlag::new())
    .await
    .unwrap();

  assert!(report.is_success(), "{:?}", report.failed().collect::<Vec<_>>());
  assert!(matches!(
    report.outcome("core"),
    Some(StageOutcome::Skipped(SkipReason::Directive(SkipDirective::SkipCore)))
  ));
  assert!(!fake.ran("ar rcs"));
  assert!(fake.ran("libn8core.a"));
  assert_eq!(std::fs::read(temp.path().join("dist/n8lang/bin/n8")).unwrap(), b"\x7fELF");
}
