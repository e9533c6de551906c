#![no_main]

use derivgen_syntax::{lexer, parser};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Convert bytes to UTF-8 string (ignore invalid UTF-8)
    if let Ok(s) = std::str::from_utf8(data) {
        // Lexing must never panic; parsing a lexable input must not either
        if lexer::lex(s).is_ok() {
            if let Ok(stmt) = parser::parse_statement(s) {
                // Printed statements parse back to the same text
                let printed = stmt.node.to_string();
                if let Ok(again) = parser::parse_statement(&printed) {
                    assert_eq!(again.node.to_string(), printed);
                }
            }
        }
    }
});
