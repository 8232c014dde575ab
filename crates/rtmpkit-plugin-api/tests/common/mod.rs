//! Common test utilities: a scripted module loader serving static descriptors

#![allow(dead_code)]

use parking_lot::Mutex;
use rtmpkit_plugin_api::abi::{
    AVal, PluginDescriptor, PluginInitFn, PluginOption, PLUGIN_API_VERSION,
};
use rtmpkit_plugin_api::{Module, ModuleLoader, PluginConfig, PluginError, PluginResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Module suffix used by the scripted tests, independent of the platform.
pub const SUFFIX: &str = ".plugin";

/// What the scripted loader does for a given file name.
#[derive(Clone, Copy)]
pub enum Script {
    /// Opens and exports the given initializer
    Exports(PluginInitFn),
    /// Opens but exports no initializer
    NoInitializer,
    /// Refuses to open
    Unopenable,
}

/// Opens and closes seen by a [`ScriptedLoader`].
#[derive(Default)]
pub struct Ledger {
    pub opened: Mutex<Vec<String>>,
    pub closed: Mutex<Vec<String>>,
}

impl Ledger {
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().clone()
    }

    pub fn closed(&self) -> Vec<String> {
        self.closed.lock().clone()
    }
}

pub struct ScriptedLoader {
    scripts: HashMap<String, Script>,
    ledger: Arc<Ledger>,
    fail_init: bool,
}

impl ScriptedLoader {
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            ledger: Arc::new(Ledger::default()),
            fail_init: false,
        }
    }

    /// Scripts the module whose file name is `file_name`.
    pub fn script(mut self, file_name: &str, script: Script) -> Self {
        self.scripts.insert(file_name.to_string(), script);
        self
    }

    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    pub fn ledger(&self) -> Arc<Ledger> {
        Arc::clone(&self.ledger)
    }
}

impl ModuleLoader for ScriptedLoader {
    fn init(&self) -> PluginResult<()> {
        if self.fail_init {
            return Err(PluginError::LoaderInit("scripted failure".into()));
        }
        Ok(())
    }

    fn open(&self, path: &Path) -> PluginResult<Box<dyn Module>> {
        let file_name = file_name(path);
        let script = self.scripts.get(&file_name).copied().unwrap_or(Script::Unopenable);
        if let Script::Unopenable = script {
            return Err(PluginError::OpenFailed {
                path: path.display().to_string(),
                reason: "not a module".into(),
            });
        }

        self.ledger.opened.lock().push(file_name);
        Ok(Box::new(ScriptedModule {
            path: path.to_path_buf(),
            script,
            ledger: Arc::clone(&self.ledger),
        }))
    }
}

struct ScriptedModule {
    path: PathBuf,
    script: Script,
    ledger: Arc<Ledger>,
}

impl Module for ScriptedModule {
    fn path(&self) -> &Path {
        &self.path
    }

    fn resolve_initializer(&self, symbol: &str) -> PluginResult<PluginInitFn> {
        match self.script {
            Script::Exports(init) => Ok(init),
            _ => Err(PluginError::MissingInitializer {
                path: self.path.display().to_string(),
                reason: format!("undefined symbol: {symbol}"),
            }),
        }
    }

    fn close(self: Box<Self>) -> PluginResult<()> {
        self.ledger.closed.lock().push(file_name(&self.path));
        Ok(())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Creates empty module files named `<stem>.plugin` inside `dir`.
pub fn touch_modules(dir: &Path, stems: &[&str]) {
    std::fs::create_dir_all(dir).unwrap();
    for stem in stems {
        std::fs::write(dir.join(format!("{stem}{SUFFIX}")), b"").unwrap();
    }
}

/// Plugin configuration scanning `user` then `system`, with the test suffix.
pub fn config(user: Option<&Path>, system: &Path) -> PluginConfig {
    let mut config = PluginConfig::with_dirs(user.map(Path::to_path_buf), system);
    config.module_suffix = SUFFIX.to_string();
    config
}

pub fn module_name(stem: &str) -> String {
    format!("{stem}{SUFFIX}")
}

// Static descriptors served by scripted modules

static SPEED_OPTIONS: [PluginOption; 2] = [
    PluginOption::new(
        AVal::from_static("speed"),
        AVal::from_static("int"),
        AVal::from_static("Playback speed"),
        None,
    ),
    PluginOption::SENTINEL,
];

pub static ALPHA_V1: PluginDescriptor = PluginDescriptor {
    required_api_version: PLUGIN_API_VERSION,
    name: AVal::from_static("alpha"),
    version: AVal::from_static("1.0"),
    author: AVal::from_static("First Author"),
    homepage: AVal::EMPTY,
    options: SPEED_OPTIONS.as_ptr(),
    create: None,
    delete: None,
};

pub static ALPHA_V2: PluginDescriptor = PluginDescriptor {
    required_api_version: PLUGIN_API_VERSION,
    name: AVal::from_static("alpha"),
    version: AVal::from_static("2.0"),
    author: AVal::from_static("Second Author"),
    homepage: AVal::EMPTY,
    options: SPEED_OPTIONS.as_ptr(),
    create: None,
    delete: None,
};

pub static BETA: PluginDescriptor = PluginDescriptor {
    required_api_version: PLUGIN_API_VERSION,
    name: AVal::from_static("beta"),
    version: AVal::from_static("0.3"),
    author: AVal::EMPTY,
    homepage: AVal::EMPTY,
    options: std::ptr::null(),
    create: None,
    delete: None,
};

pub static FUTURE: PluginDescriptor = PluginDescriptor {
    required_api_version: PLUGIN_API_VERSION + 1,
    name: AVal::from_static("future"),
    version: AVal::from_static("9.9"),
    author: AVal::EMPTY,
    homepage: AVal::EMPTY,
    options: std::ptr::null(),
    create: None,
    delete: None,
};

pub static NAMELESS: PluginDescriptor = PluginDescriptor {
    required_api_version: PLUGIN_API_VERSION,
    name: AVal::EMPTY,
    version: AVal::from_static("1.0"),
    author: AVal::EMPTY,
    homepage: AVal::EMPTY,
    options: std::ptr::null(),
    create: None,
    delete: None,
};

pub extern "C" fn alpha_v1() -> *const PluginDescriptor {
    &ALPHA_V1
}

pub extern "C" fn alpha_v2() -> *const PluginDescriptor {
    &ALPHA_V2
}

pub extern "C" fn beta() -> *const PluginDescriptor {
    &BETA
}

pub extern "C" fn future() -> *const PluginDescriptor {
    &FUTURE
}

pub extern "C" fn nameless() -> *const PluginDescriptor {
    &NAMELESS
}

pub extern "C" fn null_descriptor() -> *const PluginDescriptor {
    std::ptr::null()
}
