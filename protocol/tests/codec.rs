extern crate dhcp_protocol;
extern crate eui48;

use std::net::Ipv4Addr;

use dhcp_protocol::*;
use eui48::MacAddress;

fn offer() -> Message {
    let mut options = Options::new();
    options.set_dhcp_message_type(MessageType::DhcpOffer);
    options.set_dhcp_server_id(Ipv4Addr::new(10, 0, 0, 1));
    options.set_address_time(3600);
    options.set_subnet_mask(Ipv4Addr::new(255, 255, 255, 0));
    options.set_routers(&[Ipv4Addr::new(10, 0, 0, 1)]);
    options.set_domain_name("example.org");
    Message {
        operation_code: OperationCode::BootReply,
        hardware_type: HardwareType::Ethernet,
        hardware_address_length: 6,
        hardware_options: 0,
        transaction_id: 0xdead_beef,
        seconds: 0,
        is_broadcast: true,
        client_ip_address: Ipv4Addr::UNSPECIFIED,
        your_ip_address: Ipv4Addr::new(10, 0, 0, 5),
        server_ip_address: Ipv4Addr::new(10, 0, 0, 1),
        gateway_ip_address: Ipv4Addr::UNSPECIFIED,
        client_hardware_address: MacAddress::new([0x00, 0x0c, 0x29, 0x13, 0x0e, 0x37]),
        server_name: b"dhcp.example.org".to_vec(),
        boot_filename: Vec::new(),
        options,
    }
}

fn encode(message: &Message) -> Vec<u8> {
    let mut buffer = vec![0u8; SIZE_MESSAGE_MINIMAL];
    let length = message.to_bytes(&mut buffer).unwrap();
    buffer.truncate(length);
    buffer
}

#[test]
fn header_fields_survive_the_wire() {
    let bytes = encode(&offer());
    assert_eq!(bytes[0], u8::from(OperationCode::BootReply));
    assert_eq!(&bytes[4..8], &[0xde, 0xad, 0xbe, 0xef]);
    assert_eq!(&bytes[10..12], &[0x80, 0x00]);
    assert_eq!(&bytes[OFFSET_MAGIC_COOKIE..OFFSET_OPTIONS], &[0x63, 0x82, 0x53, 0x63]);
    // the message type leads the options
    assert_eq!(&bytes[OFFSET_OPTIONS..OFFSET_OPTIONS + 3], &[53, 1, 2]);
    assert_eq!(*bytes.last().unwrap(), OptionTag::End as u8);

    let decoded = Message::from_bytes(&bytes).unwrap();
    assert_eq!(decoded.transaction_id, 0xdead_beef);
    assert!(decoded.is_broadcast);
    assert_eq!(decoded.your_ip_address, Ipv4Addr::new(10, 0, 0, 5));
    assert_eq!(decoded.server_name(), "dhcp.example.org");
    assert_eq!(decoded.boot_filename(), "");
    assert_eq!(decoded.options, offer().options);
    assert_eq!(decoded.validate(), Ok(MessageType::DhcpOffer));
}

#[test]
fn long_options_are_split_and_joined() {
    let mut message = offer();
    let long: Vec<u8> = (0..600u32).map(|i| i as u8).collect();
    message.options.set(224, long.clone());

    let mut buffer = vec![0u8; 1500];
    let length = message.to_bytes(&mut buffer).unwrap();
    let bytes = &buffer[..length];
    assert_eq!(bytes.windows(2).filter(|pair| pair[0] == 224 && pair[1] == 255).count(), 2);

    let decoded = Message::from_bytes(bytes).unwrap();
    assert_eq!(decoded.options.get(224), Some(&long[..]));
}

#[test]
fn overloaded_fields_are_read_as_options() {
    let mut bytes = encode(&offer());
    // move the domain name into `file` and announce it with option 52
    let mut file = vec![15u8, 4];
    file.extend_from_slice(b"lan!");
    file.push(OptionTag::End as u8);
    bytes[OFFSET_BOOT_FILENAME..OFFSET_BOOT_FILENAME + file.len()].copy_from_slice(&file);
    let end = bytes.len() - 1;
    bytes.truncate(end);
    bytes.extend_from_slice(&[52, 1, 1, 255]);

    let decoded = Message::from_bytes(&bytes).unwrap();
    assert_eq!(decoded.options.domain_name(), Some("example.orglan!".to_owned()));
    assert_eq!(decoded.options.overload(), None);
    assert!(decoded.boot_filename.is_empty());
    assert_eq!(decoded.server_name(), "dhcp.example.org");
}

#[test]
fn pad_options_are_skipped() {
    let mut bytes = encode(&offer());
    bytes.insert(OFFSET_OPTIONS, OptionTag::Pad as u8);
    bytes.insert(OFFSET_OPTIONS, OptionTag::Pad as u8);
    let decoded = Message::from_bytes(&bytes).unwrap();
    assert_eq!(decoded.options.dhcp_message_type(), Some(MessageType::DhcpOffer));
}

#[test]
fn truncated_packets_are_rejected() {
    let bytes = encode(&offer());
    assert!(Message::from_bytes(&bytes[..OFFSET_OPTIONS - 1]).is_err());

    let mut broken = bytes.clone();
    let end = broken.len() - 1;
    broken.truncate(end);
    broken.extend_from_slice(&[12, 10, b'x']);
    assert!(Message::from_bytes(&broken).is_err());

    let mut cookie = bytes;
    cookie[OFFSET_MAGIC_COOKIE] = 0;
    assert!(Message::from_bytes(&cookie).is_err());
}

#[test]
fn small_buffers_and_long_names_are_refused() {
    let mut buffer = vec![0u8; OFFSET_OPTIONS + 4];
    assert!(offer().to_bytes(&mut buffer).is_err());

    let mut message = offer();
    message.server_name = vec![b'a'; SIZE_SERVER_NAME + 1];
    let mut buffer = vec![0u8; SIZE_MESSAGE_MINIMAL];
    assert!(message.to_bytes(&mut buffer).is_err());
}

#[test]
fn validation_requires_server_options() {
    let mut message = offer();
    message.options.remove(OptionTag::AddressTime as u8);
    assert_eq!(message.validate(), Err(Error::Validation("address_time")));

    message.options.remove(OptionTag::DhcpMessageType as u8);
    assert!(message.is_bootp());
    assert_eq!(message.validate(), Err(Error::Validation("dhcp_message_type")));
}
