//! Wire formats of system announcements and relayed lines.

use relaycast::{arrival_message, client_message, departure_message};

#[test]
fn arrival_and_departure_formats() {
    assert_eq!(arrival_message(0), b"server: client 0 just arrived\n");
    assert_eq!(departure_message(42), b"server: client 42 just left\n");
}

#[test]
fn client_lines_carry_raw_bytes_unmodified() {
    assert_eq!(client_message(0, b"hi\n"), b"client 0: hi\n");

    // No escaping, no newline enforcement, no UTF-8 requirement.
    let raw = [0x00, 0xff, b'x'];
    let mut expected = b"client 7: ".to_vec();
    expected.extend_from_slice(&raw);
    assert_eq!(client_message(7, &raw), expected);
}
