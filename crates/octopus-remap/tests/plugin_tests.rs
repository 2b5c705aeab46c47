//! Remap plugin integration tests

use octopus_remap::{RemapConfig, RemapError, RemapPlugin, RemapStatus};
use octopus_scripting::{NativeMap, RecordingSink, RuntimeConfig, ScriptRuntime};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

struct Fixture {
    plugin: Arc<RemapPlugin>,
    sink: Arc<RecordingSink>,
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let sink = Arc::new(RecordingSink::new());
        let runtime = Arc::new(ScriptRuntime::new(RuntimeConfig::default(), sink.clone()).unwrap());
        let dir = tempfile::tempdir().unwrap();
        let config = RemapConfig::default().with_config_dir(dir.path());
        Self {
            plugin: Arc::new(RemapPlugin::with_runtime(runtime, config)),
            sink,
            dir,
        }
    }

    fn script(&self, name: &str, code: &str) -> String {
        fs::write(self.dir.path().join(name), code).unwrap();
        name.to_string()
    }
}

#[test]
fn test_rule_options_reach_script() {
    let fx = Fixture::new();
    let script = fx.script(
        "route.rhai",
        r#"fn Process() { options["upstream"] = "pool-" + options["tier"]; }"#,
    );

    let id = fx
        .plugin
        .new_instance(&["http://a.example", "http://b.example", script.as_str(), "tier=gold"])
        .unwrap();

    assert_eq!(fx.plugin.do_remap(id), RemapStatus::NoRemap);
    let options = fx.plugin.instance_options(id).unwrap();
    assert_eq!(options.get("upstream"), Some("pool-gold"));
    assert!(fx.sink.errors().is_empty());
}

#[test]
fn test_absolute_script_path() {
    let fx = Fixture::new();
    fx.script("abs.rhai", "fn Process() {}");
    let path = fx.dir.path().join("abs.rhai");

    let id = fx
        .plugin
        .create_instance(path.to_str().unwrap(), NativeMap::new())
        .unwrap();
    assert_eq!(fx.plugin.do_remap(id), RemapStatus::NoRemap);
}

#[test]
fn test_creation_failures() {
    let fx = Fixture::new();
    let broken = fx.script("broken.rhai", "fn Process() {");
    let headless = fx.script("headless.rhai", "fn Handle() {}");
    let throws = fx.script("throws.rhai", r#"throw "bad config";"#);

    assert!(matches!(
        fx.plugin.create_instance("", NativeMap::new()),
        Err(RemapError::InvalidConfig(_))
    ));
    assert!(matches!(
        fx.plugin.create_instance("missing.rhai", NativeMap::new()),
        Err(RemapError::ScriptLoad(_))
    ));
    assert!(matches!(
        fx.plugin.create_instance(&broken, NativeMap::new()),
        Err(RemapError::Compile(_))
    ));
    assert!(matches!(
        fx.plugin.create_instance(&headless, NativeMap::new()),
        Err(RemapError::MissingEntryPoint(_))
    ));
    assert!(matches!(
        fx.plugin.create_instance(&throws, NativeMap::new()),
        Err(RemapError::ScriptRuntime(_))
    ));

    assert_eq!(fx.plugin.instance_count(), 0);
    assert_eq!(fx.plugin.runtime().bridge().live_count(), 0);
}

#[test]
fn test_script_exception_does_not_fail_remap() {
    let fx = Fixture::new();
    let script = fx.script("fails.rhai", r#"fn Process() { throw "no route"; }"#);
    let id = fx.plugin.create_instance(&script, NativeMap::new()).unwrap();

    assert_eq!(fx.plugin.do_remap(id), RemapStatus::NoRemap);
    let errors = fx.sink.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("no route"));
}

#[test]
fn test_delete_instance() {
    let fx = Fixture::new();
    let script = fx.script("a.rhai", "fn Process() {}");
    let id = fx.plugin.create_instance(&script, NativeMap::new()).unwrap();

    assert!(fx.plugin.delete_instance(id));
    assert!(!fx.plugin.delete_instance(id));
    assert_eq!(fx.plugin.instance_count(), 0);
    assert_eq!(fx.plugin.runtime().bridge().live_count(), 0);
    assert_eq!(fx.plugin.do_remap(id), RemapStatus::NoRemap);
}

#[test]
fn test_host_option_update_seen_by_next_remap() {
    let fx = Fixture::new();
    let script = fx.script(
        "echo.rhai",
        r#"fn Process() { this.options["echo"] = this.options["path"]; }"#,
    );
    let id = fx.plugin.create_instance(&script, NativeMap::new()).unwrap();

    assert!(fx.plugin.set_instance_option(id, "path", "/v2/users").unwrap());
    fx.plugin.do_remap(id);

    let options = fx.plugin.instance_options(id).unwrap();
    assert_eq!(options.get("echo"), Some("/v2/users"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_async_remaps() {
    let fx = Fixture::new();
    let script = fx.script(
        "count.rhai",
        r#"
            fn Process() {
                let n = options["n"];
                options["n"] = if type_of(n) == "()" { 1 } else { parse_int(n) + 1 };
            }
        "#,
    );
    let ids: Vec<_> = (0..3)
        .map(|_| fx.plugin.create_instance(&script, NativeMap::new()).unwrap())
        .collect();

    let mut tasks = Vec::new();
    for _ in 0..10 {
        for &id in &ids {
            tasks.push(tokio::spawn(Arc::clone(&fx.plugin).do_remap_async(id)));
        }
    }
    for task in tasks {
        assert_eq!(task.await.unwrap(), RemapStatus::NoRemap);
    }

    for id in ids {
        let options = fx.plugin.instance_options(id).unwrap();
        assert_eq!(options.get("n"), Some("10"));
    }
    assert!(fx.sink.errors().is_empty());
}
