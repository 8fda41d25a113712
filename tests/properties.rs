use proptest::prelude::*;

use ossm_protocol::ble::{self, Command, MAX_STREAM_DURATION_MS, MAX_STREAM_POSITION};
use ossm_protocol::config::ModbusConfig;
use ossm_protocol::modbus::{
    self, FunctionCode, ModbusError, RegisterClient, RegisterValues, SimulatedDrive,
};

fn function_code() -> impl Strategy<Value = FunctionCode> {
    prop_oneof![
        Just(FunctionCode::ReadHoldingRegisters),
        Just(FunctionCode::WriteSingleRegister),
    ]
}

proptest! {
    #[test]
    fn prop_requests_carry_valid_crc(
        slave in any::<u8>(),
        function in function_code(),
        register in any::<u16>(),
        value in any::<u16>(),
    ) {
        let frame = modbus::build_request(slave, function, register, value);
        prop_assert!(modbus::crc_matches(&frame));
        prop_assert_eq!(frame[0], slave);
        prop_assert_eq!(u16::from_be_bytes([frame[2], frame[3]]), register);
        prop_assert_eq!(u16::from_be_bytes([frame[4], frame[5]]), value);
    }

    #[test]
    fn prop_corrupted_byte_breaks_crc(
        register in any::<u16>(),
        value in any::<u16>(),
        index in 0usize..modbus::REQUEST_LEN,
        flip in 1u8..=255,
    ) {
        let mut frame = modbus::build_write_command(register, value);
        frame[index] ^= flip;
        prop_assert!(!modbus::crc_matches(&frame));
    }

    #[test]
    fn prop_single_register_read_decodes(slave in any::<u8>(), value in any::<u16>()) {
        let response = modbus::build_read_response(slave, &[value]);
        prop_assert_eq!(
            modbus::parse_read_response(&response).unwrap(),
            RegisterValues::Single(value)
        );
    }

    #[test]
    fn prop_exception_frames_report_their_code(
        function in function_code(),
        code in any::<u8>(),
    ) {
        let frame = modbus::build_exception_response(1, function as u8, code);
        prop_assert_eq!(frame.len(), modbus::EXCEPTION_RESPONSE_LEN);

        let result = match function {
            FunctionCode::ReadHoldingRegisters => modbus::parse_read_response(&frame).map(|_| ()),
            FunctionCode::WriteSingleRegister => modbus::parse_write_response(&frame).map(|_| ()),
        };
        prop_assert!(matches!(result, Err(ModbusError::Exception { code: c }) if c == code), "expected exception response with code {}, got {:?}", code, result);
    }

    #[test]
    fn prop_stream_is_always_in_range(position in any::<i64>(), duration in any::<i64>()) {
        match Command::stream(position, duration) {
            Command::Stream { position, duration_ms } => {
                prop_assert!(position <= MAX_STREAM_POSITION);
                prop_assert!(duration_ms <= MAX_STREAM_DURATION_MS);
            }
            other => prop_assert!(false, "unexpected {:?}", other),
        }
    }

    #[test]
    fn prop_stream_clamping_is_idempotent(position in any::<i64>(), duration in any::<i64>()) {
        let clamped_position = position.clamp(0, i64::from(MAX_STREAM_POSITION));
        let clamped_duration = duration.clamp(0, i64::from(MAX_STREAM_DURATION_MS));
        prop_assert_eq!(
            ble::encode_stream_command(position, duration),
            ble::encode_stream_command(clamped_position, clamped_duration)
        );
    }

    #[test]
    fn prop_stream_wire_string_parses_back(position in -50i64..200, duration in -10i64..20_000) {
        let command = Command::stream(position, duration);
        prop_assert_eq!(command.to_string().parse::<Command>().unwrap(), command);
    }

    #[test]
    fn prop_writes_survive_fragmented_replies(
        chunk in 1usize..8,
        register in 0u16..modbus::regs::list_registers().len() as u16,
        value in any::<u16>(),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();

        let drive = SimulatedDrive::new().with_chunk_size(chunk);
        let mut client = RegisterClient::new(drive, ModbusConfig::default());
        let read = runtime.block_on(async {
            client.write_register(register, value).await?;
            client.read_register(register).await
        });
        prop_assert_eq!(read.unwrap(), value);
    }
}
