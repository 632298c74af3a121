//! Tests for telemetry packet decoding

mod common;

use common::*;
use tc66c_lib::decode_packet;
use tc66c_lib::packet::{parse_reading, reorder_blocks};
use zerocopy::byteorder::little_endian::U32;

#[test]
fn test_decode_sample_packet() {
    let fixture = PacketFixture::sample();
    let reading = decode_packet(&fixture.encrypted()).expect("Failed to decode packet");

    assert_eq!(reading, PacketFixture::expected_reading());
    assert_eq!(reading.voltage, 5.1234);
}

#[test]
fn test_decode_is_order_independent() {
    let fixture = PacketFixture::sample();
    let expected = PacketFixture::expected_reading();

    for order in ALL_ORDERS {
        let encrypted = encrypt_packet(&fixture.plaintext_in_order(order));
        let reading = decode_packet(&encrypted).unwrap_or_else(|e| panic!("order {:?}: {}", order, e));
        assert_eq!(reading, expected, "order {:?}", order);
    }
}

#[test]
fn test_reorder_canonical_is_unchanged() {
    let plaintext = PacketFixture::sample().plaintext();
    assert_eq!(reorder_blocks(&plaintext).unwrap(), plaintext);
}

#[test]
fn test_reorder_restores_canonical_order() {
    let fixture = PacketFixture::sample();
    let shuffled = fixture.plaintext_in_order([BlockTag::Pac3, BlockTag::Pac1, BlockTag::Pac2]);
    assert_eq!(reorder_blocks(&shuffled).unwrap(), fixture.plaintext());
}

#[test]
fn test_negative_temperature() {
    let mut fixture = PacketFixture::sample();
    fixture.pac2.temperature_sign = U32::new(1);
    fixture.pac2.temperature = U32::new(12);
    fixture.seal();

    let reading = parse_reading(&fixture.plaintext()).unwrap();
    assert_eq!(reading.temperature, -12.0);
}

#[test]
fn test_any_nonzero_sign_is_negative() {
    let mut fixture = PacketFixture::sample();
    fixture.pac2.temperature_sign = U32::new(0xFFFF_FFFF);
    fixture.seal();

    let reading = parse_reading(&fixture.plaintext()).unwrap();
    assert_eq!(reading.temperature, -25.0);
}

#[test]
fn test_full_width_fields() {
    let mut fixture = PacketFixture::sample();
    fixture.pac1.product = *b"TC66";
    fixture.pac1.version = *b"1.14";
    fixture.pac1.serial_number = U32::new(u32::MAX);
    fixture.pac2.group1_mwh = U32::new(u32::MAX);
    fixture.seal();

    let reading = parse_reading(&fixture.plaintext()).unwrap();
    assert_eq!(reading.version, "1.14");
    assert_eq!(reading.serial_number, u32::MAX);
    assert_eq!(reading.group1_mwh, u32::MAX);
}

#[test]
fn test_reading_json_field_names() {
    let reading = PacketFixture::expected_reading();
    let json = serde_json::to_value(&reading).unwrap();

    assert_eq!(json["product"], "TC66");
    assert_eq!(json["version"], "1.4");
    assert_eq!(json["serial_number"], 1_234_567);
    assert_eq!(json["num_runs"], 42);
    assert_eq!(json["voltage"], 5.1234);
    assert_eq!(json["current"], 1.23456);
    assert_eq!(json["power"], 6.325);
    assert_eq!(json["resistance"], 4.15);
    assert_eq!(json["group0_mah"], 100);
    assert_eq!(json["group0_mwh"], 500);
    assert_eq!(json["group1_mah"], 7);
    assert_eq!(json["group1_mwh"], 35);
    assert_eq!(json["temperature"], 25.0);
    assert_eq!(json["dplus_voltage"], 0.6);
    assert_eq!(json["dminus_voltage"], 0.01);

    let back: Reading = serde_json::from_value(json).unwrap();
    assert_eq!(back, reading);
}

#[test]
fn test_reading_display() {
    let reading = PacketFixture::expected_reading();
    let text = reading.to_string();
    assert!(text.starts_with("Product: TC66\n"));
    assert!(text.contains("Voltage: 5.1234 V"));
    assert!(text.contains("Group 1: 7 mAh / 35 mWh"));
    assert!(text.ends_with("D- Voltage: 0.01 V"));

    assert_eq!(
        reading.short_summary(),
        "V: 5.1234V | I: 1.23456A | P: 6.3250W | R: 4.15Ω | T: 25.0°C | D+: 0.60V | D-: 0.01V"
    );
}
