use rtmpkit_plugin_api::abi::{AVal, PluginDescriptor, PluginOption, PLUGIN_API_VERSION};
use rtmpkit_plugin_api::rtmp_plugin;
use std::ffi::c_void;

/// Example Packet Counting Plugin
///
/// Claims the `counts` connection option. A non-zero value enables counting
/// of received packets and payload bytes for that connection.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExampleData {
    pub enabled: i64,
    pub packet_count: u64,
    pub total_bytes: u64,
}

impl ExampleData {
    /// Accounts for one received packet. Returns false while counting is off.
    pub fn record_packet(&mut self, body_size: u32) -> bool {
        if self.enabled == 0 {
            return false;
        }
        self.packet_count += 1;
        self.total_bytes += u64::from(body_size);
        true
    }
}

const OPTION_NAME: &str = "counts";

static OPTIONS: [PluginOption; 2] = [
    PluginOption::new(
        AVal::from_static(OPTION_NAME),
        AVal::from_static("int"),
        AVal::from_static("If non-zero, print packet sizes and count"),
        Some(parse_option),
    ),
    PluginOption::SENTINEL,
];

pub static DESCRIPTOR: PluginDescriptor = PluginDescriptor {
    required_api_version: PLUGIN_API_VERSION,
    name: AVal::from_static("example"),
    version: AVal::from_static("1.0"),
    author: AVal::from_static("rtmpkit Contributors"),
    homepage: AVal::EMPTY,
    options: OPTIONS.as_ptr(),
    create: Some(create_instance),
    delete: Some(delete_instance),
};

rtmp_plugin!(DESCRIPTOR);

unsafe extern "C" fn create_instance(_connection: *mut c_void) -> *mut c_void {
    Box::into_raw(Box::<ExampleData>::default()).cast()
}

unsafe extern "C" fn delete_instance(_connection: *mut c_void, state: *mut c_void) {
    if state.is_null() {
        return;
    }
    // SAFETY: `state` came from `create_instance` and is released once.
    drop(unsafe { Box::from_raw(state.cast::<ExampleData>()) });
}

unsafe extern "C" fn parse_option(name: *const AVal, value: *const AVal, state: *mut c_void) {
    if name.is_null() || value.is_null() || state.is_null() {
        return;
    }
    // SAFETY: the host passes valid AVals for the duration of the call and
    // the state returned by `create_instance`.
    let (name, value, data) = unsafe {
        (
            (*name).as_bytes(),
            (*value).as_bytes(),
            &mut *state.cast::<ExampleData>(),
        )
    };

    if !name.eq_ignore_ascii_case(OPTION_NAME.as_bytes()) {
        return;
    }
    data.enabled = parse_int(value);
}

/// Parses an integer the way C's `strtol(s, NULL, 0)` does: leading
/// whitespace, optional sign, `0x` for hex, leading `0` for octal. Parsing
/// stops at the first invalid digit; no digits at all yields zero.
pub fn parse_int(input: &[u8]) -> i64 {
    let mut rest = input;
    while let [b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c, tail @ ..] = rest {
        rest = tail;
    }

    let negative = match rest {
        [b'-', tail @ ..] => {
            rest = tail;
            true
        }
        [b'+', tail @ ..] => {
            rest = tail;
            false
        }
        _ => false,
    };

    let radix = match rest {
        [b'0', b'x' | b'X', d, ..] if d.is_ascii_hexdigit() => {
            rest = &rest[2..];
            16
        }
        [b'0', ..] => 8,
        _ => 10,
    };

    let mut value: i64 = 0;
    for &byte in rest {
        let Some(digit) = char::from(byte).to_digit(radix) else {
            break;
        };
        value = value
            .saturating_mul(i64::from(radix))
            .saturating_add(i64::from(digit));
    }

    if negative {
        value.saturating_neg()
    } else {
        value
    }
}
