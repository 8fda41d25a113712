//! Protocol layer for the OSSM ecosystem: the gold motor's Modbus-RTU
//! register interface and the OSSM's BLE line command protocol.
//!
//! Neither stack opens a port or a GATT connection itself. Callers hand in a
//! [`transport::ByteTransport`] or a [`ble::CharacteristicTransport`] and the
//! session object owns it until it is closed or dropped.

pub mod ble;
pub mod config;
pub mod funscript;
pub mod modbus;
pub mod transport;
