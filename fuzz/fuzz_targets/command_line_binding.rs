#![no_main]

use castline_commands::{bind_arguments, tokenize, ArgValue, OptionSpec};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    let tokens = tokenize(&raw);
    if raw.is_empty() {
        assert!(tokens.is_empty());
    }

    let options = [
        OptionSpec::string("user"),
        OptionSpec::number("count"),
        OptionSpec::flag("highlight"),
    ];
    let arguments = tokens.get(1..).unwrap_or_default();
    let parsed = bind_arguments(&options, arguments);
    assert_eq!(parsed.values().len(), options.len());
    assert!(matches!(parsed.values()[0], ArgValue::Text(_)));
    assert!(matches!(parsed.values()[1], ArgValue::Number(_)));
    assert!(matches!(parsed.values()[2], ArgValue::Flag(_)));
});
