use rand::Rng;

use ipk_chat::command::ClientCommand;
use ipk_chat::packet::{opcode, Packet};
use ipk_chat::text;

fn random_bytes(rng: &mut impl Rng, max_len: usize) -> Vec<u8> {
    let len = rng.random_range(0..=max_len);
    (0..len).map(|_| rng.random::<u8>()).collect()
}

#[test]
fn fuzz_random_datagrams() {
    let mut rng = rand::rng();

    // Decoding arbitrary input must fail cleanly, never panic
    for _ in 0..5_000 {
        let bytes = random_bytes(&mut rng, 64);
        let _ = Packet::decode(&bytes);
    }
}

#[test]
fn fuzz_known_opcode_with_random_body() {
    let mut rng = rand::rng();
    let opcodes = [
        opcode::CONFIRM,
        opcode::REPLY,
        opcode::AUTH,
        opcode::JOIN,
        opcode::MSG,
        opcode::ERR,
        opcode::BYE,
    ];

    for _ in 0..5_000 {
        let mut bytes = random_bytes(&mut rng, 48);
        bytes.insert(0, opcodes[rng.random_range(0..opcodes.len())]);
        if let Ok(packet) = Packet::decode(&bytes) {
            // Anything accepted re-encodes to the same bytes
            assert_eq!(packet.encode().unwrap(), bytes);
        }
    }
}

#[test]
fn fuzz_truncated_messages() {
    let mut rng = rand::rng();
    let packet = Packet::Msg {
        id: rng.random::<u16>(),
        display_name: "fuzzer".into(),
        content: "some chat content".into(),
    };
    let bytes = packet.encode().unwrap();

    // Every strict prefix is rejected
    for cut in 0..bytes.len() {
        assert!(Packet::decode(&bytes[..cut]).is_err(), "prefix of {cut} bytes decoded");
    }
    assert_eq!(Packet::decode(&bytes).unwrap(), packet);
}

#[test]
fn fuzz_random_text_lines() {
    let mut rng = rand::rng();

    for _ in 0..5_000 {
        let bytes = random_bytes(&mut rng, 80);
        let line = String::from_utf8_lossy(&bytes);
        let _ = text::decode(&line);
    }
}

#[test]
fn fuzz_mutated_text_lines() {
    let mut rng = rand::rng();
    let seeds = [
        "REPLY OK IS welcome\r\n",
        "REPLY NOK IS nope\r\n",
        "MSG FROM bob IS hi there\r\n",
        "ERR FROM server IS broken\r\n",
        "BYE\r\n",
    ];

    for _ in 0..5_000 {
        let mut bytes = seeds[rng.random_range(0..seeds.len())].as_bytes().to_vec();
        let pos = rng.random_range(0..bytes.len());
        bytes[pos] = rng.random_range(0x20..0x7f);
        let line = String::from_utf8_lossy(&bytes);
        let _ = text::decode(&line);
    }
}

#[test]
fn fuzz_user_input() {
    let mut rng = rand::rng();
    let words = ["/auth", "/join", "/rename", "/help", "/", "a", "b c", "  ", "\t"];

    for _ in 0..2_000 {
        let count = rng.random_range(0..6);
        let line: Vec<&str> = (0..count)
            .map(|_| words[rng.random_range(0..words.len())])
            .collect();
        let line = line.join(" ");
        if let Some(ClientCommand::Send { text }) = ClientCommand::parse(&line) {
            assert!(!text.trim().is_empty());
        }
    }
}
