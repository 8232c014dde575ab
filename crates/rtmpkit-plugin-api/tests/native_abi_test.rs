//! End-to-end option dispatch through the native hook ABI

mod common;

use common::{config, module_name, touch_modules, Script, ScriptedLoader};
use parking_lot::Mutex;
use rtmpkit_plugin_api::abi::{AVal, PluginDescriptor, PluginOption, PLUGIN_API_VERSION};
use rtmpkit_plugin_api::{Connection, ConnectionId, DispatchOutcome, HostHandle, PluginHost};
use std::ffi::c_void;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

struct CountsData {
    enabled: i64,
}

static CREATES: AtomicUsize = AtomicUsize::new(0);
static DELETES: AtomicUsize = AtomicUsize::new(0);
static LAST_HOST: AtomicUsize = AtomicUsize::new(0);
static FINAL_ENABLED: AtomicI64 = AtomicI64::new(-1);
static PARSED: Mutex<Vec<(String, String)>> = parking_lot::const_mutex(Vec::new());

unsafe fn read(value: *const AVal) -> String {
    let value = unsafe { &*value };
    let bytes = unsafe { value.as_bytes() };
    // Values arrive NUL-terminated past `len`.
    assert_eq!(unsafe { *value.val.add(value.len) }, 0);
    String::from_utf8_lossy(bytes).into_owned()
}

unsafe extern "C" fn create(connection: *mut c_void) -> *mut c_void {
    CREATES.fetch_add(1, Ordering::SeqCst);
    LAST_HOST.store(connection as usize, Ordering::SeqCst);
    Box::into_raw(Box::new(CountsData { enabled: 0 })).cast()
}

unsafe extern "C" fn delete(connection: *mut c_void, state: *mut c_void) {
    DELETES.fetch_add(1, Ordering::SeqCst);
    assert_eq!(connection as usize, LAST_HOST.load(Ordering::SeqCst));
    let data = unsafe { Box::from_raw(state.cast::<CountsData>()) };
    FINAL_ENABLED.store(data.enabled, Ordering::SeqCst);
}

unsafe extern "C" fn parse_counts(name: *const AVal, value: *const AVal, state: *mut c_void) {
    let name = unsafe { read(name) };
    let value = unsafe { read(value) };
    let data = unsafe { &mut *state.cast::<CountsData>() };
    data.enabled = value.parse().unwrap_or(0);
    PARSED.lock().push((name, value));
}

static OPTIONS: [PluginOption; 2] = [
    PluginOption::new(
        AVal::from_static("counts"),
        AVal::from_static("int"),
        AVal::from_static("If non-zero, print packet sizes and count"),
        Some(parse_counts),
    ),
    PluginOption::SENTINEL,
];

static EXAMPLE: PluginDescriptor = PluginDescriptor {
    required_api_version: PLUGIN_API_VERSION,
    name: AVal::from_static("example"),
    version: AVal::from_static("1.0"),
    author: AVal::EMPTY,
    homepage: AVal::EMPTY,
    options: OPTIONS.as_ptr(),
    create: Some(create),
    delete: Some(delete),
};

extern "C" fn example() -> *const PluginDescriptor {
    &EXAMPLE
}

#[test]
fn test_counts_option_end_to_end() {
    let system = tempfile::tempdir().unwrap();
    touch_modules(system.path(), &["example"]);

    let host = PluginHost::builder()
        .config(config(None, system.path()))
        .loader(ScriptedLoader::new().script(&module_name("example"), Script::Exports(example)))
        .build();

    let mut session = 0u8;
    let handle = HostHandle::from_raw(std::ptr::addr_of_mut!(session).cast());
    let mut conn = Connection::with_host_handle(ConnectionId::new(), handle);

    let outcome = host.dispatch(&mut conn, "counts", "1").unwrap();
    assert_eq!(outcome, DispatchOutcome::Handled);
    assert_eq!(CREATES.load(Ordering::SeqCst), 1);
    assert_eq!(LAST_HOST.load(Ordering::SeqCst), handle.as_ptr() as usize);

    let outcome = host.dispatch(&mut conn, "COUNTS", "5").unwrap();
    assert_eq!(outcome, DispatchOutcome::Handled);
    assert_eq!(CREATES.load(Ordering::SeqCst), 1);
    assert_eq!(conn.instances().len(), 1);

    let outcome = host.dispatch(&mut conn, "playpath", "live").unwrap();
    assert_eq!(outcome, DispatchOutcome::NotHandled);
    assert_eq!(conn.instances().len(), 1);

    assert_eq!(
        PARSED.lock().as_slice(),
        [
            ("counts".to_string(), "1".to_string()),
            ("COUNTS".to_string(), "5".to_string()),
        ]
    );

    host.delete_all_instances(&mut conn);
    assert_eq!(DELETES.load(Ordering::SeqCst), 1);
    assert_eq!(FINAL_ENABLED.load(Ordering::SeqCst), 5);
    assert!(conn.instances().is_empty());

    host.delete_all_instances(&mut conn);
    drop(conn);
    assert_eq!(DELETES.load(Ordering::SeqCst), 1);

    assert_eq!(
        host.option_usage(),
        vec![
            "Options provided by example 1.0 plugin:".to_string(),
            "    counts int      If non-zero, print packet sizes and count".to_string(),
        ]
    );
}
