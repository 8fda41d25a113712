mod cli;

use std::fmt::Display;
use std::io;

use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::{generate, shells::Bash};
use itertools::Itertools;
use json::JsonValue;
use log::{error, warn};

use ossm_protocol::ble::{self, Command, CommandReply};
use ossm_protocol::config::ModbusConfig;
use ossm_protocol::funscript::Funscript;
use ossm_protocol::modbus::regs::{self, Reg, RegSpec};
use ossm_protocol::modbus::{
    self, AdvancedSettings, ExceptionCode, MotorSettings, RegisterClient, RegisterValues,
    RegisterWrite, SimulatedDrive,
};

use cli::{Cli, Commands, FrameRequest, FrameType, HexBytes, PayloadType, SettingSpec};

enum OutputFormat {
    Plain,
    Json,
}

fn slice_to_column<T>(data: &[T]) -> String
where
    T: Display,
{
    data.iter().map(|x| x.to_string()).join("\n")
}

fn hex_line(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).join(" ")
}

fn concat(bytes: &[HexBytes]) -> Vec<u8> {
    bytes.iter().flat_map(|b| b.iter().copied()).collect()
}

fn lookup(regspec: &RegSpec) -> Result<Reg> {
    regs::find_register(regspec).ok_or_else(|| anyhow!("Register {:?} not found", regspec))
}

fn cmd_list_registers(fmt: OutputFormat) -> Result<String> {
    let regs = regs::list_registers();
    Ok(match fmt {
        OutputFormat::Plain => slice_to_column(regs),
        OutputFormat::Json => {
            let mut out = JsonValue::new_array();
            for reg in regs {
                let mut obj = JsonValue::new_object();
                obj["address"] = reg.address.into();
                obj["name"] = reg.name.into();
                out.push(obj)?;
            }
            json::stringify(out)
        }
    })
}

fn cmd_frame(slave: u8, request: FrameRequest) -> Result<String> {
    let frame = match request {
        FrameRequest::Read { reg } => modbus::build_request(
            slave,
            modbus::FunctionCode::ReadHoldingRegisters,
            lookup(&reg)?.address,
            1,
        ),
        FrameRequest::Write { reg, value } => modbus::build_request(
            slave,
            modbus::FunctionCode::WriteSingleRegister,
            lookup(&reg)?.address,
            value,
        ),
    };
    Ok(hex_line(&frame))
}

fn cmd_crc(bytes: &[HexBytes], fmt: OutputFormat) -> Result<String> {
    let data = concat(bytes);
    let crc = modbus::crc16_modbus(&data);
    let wire = modbus::crc_wire_bytes(crc);

    Ok(match fmt {
        OutputFormat::Plain => format!("0x{:04x} ({})", crc, hex_line(&wire)),
        OutputFormat::Json => {
            let mut obj = JsonValue::new_object();
            obj["crc"] = crc.into();
            obj["wire"] = hex::encode(wire).into();
            json::stringify(obj)
        }
    })
}

fn cmd_parse(kind: FrameType, bytes: &[HexBytes], fmt: OutputFormat) -> Result<String> {
    let frame = concat(bytes);
    if !modbus::crc_matches(&frame) {
        warn!("crc mismatch in {}", hex_line(&frame));
    }

    let parsed = match kind {
        FrameType::Read => modbus::parse_read_response(&frame).map(|values| match values {
            RegisterValues::Single(v) => v.to_string(),
            RegisterValues::Multiple(vs) => vs.iter().join(" "),
        }),
        FrameType::Write => modbus::parse_write_response(&frame).map(|ok| {
            if ok {
                "acknowledged".to_string()
            } else {
                "not acknowledged".to_string()
            }
        }),
    };

    match parsed {
        Ok(s) => Ok(match fmt {
            OutputFormat::Plain => s,
            OutputFormat::Json => json::stringify(s),
        }),
        Err(e) => match e.exception_code() {
            Some(code) => Err(anyhow!("{} ({})", e, code)),
            None => Err(e.into()),
        },
    }
}

async fn cmd_simulate_write(
    config: ModbusConfig,
    settings: MotorSettings,
    extra: &[SettingSpec],
    reject: &[RegSpec],
    fmt: OutputFormat,
) -> Result<String> {
    let mut batch = settings.to_batch();
    for spec in extra {
        batch.push(RegisterWrite::new(lookup(&spec.reg)?.address, spec.value));
    }

    let mut drive = SimulatedDrive::new().with_slave_address(config.slave_address);
    for regspec in reject {
        drive = drive.with_rejected_register(
            lookup(regspec)?.address,
            ExceptionCode::IllegalDataValue,
        );
    }

    let mut client = RegisterClient::new(drive, config);
    let report = modbus::apply_settings(&mut client, &batch)
        .await
        .context("Write sequence failed")?;

    Ok(match fmt {
        OutputFormat::Plain => {
            let rows = report.readback.iter().map(|row| {
                format!(
                    "{} 0x{:02x} {:<42} {}",
                    if row.written { "*" } else { " " },
                    row.address,
                    row.name,
                    row.value.map_or("null".to_string(), |v| v.to_string())
                )
            });
            let summary = format!(
                "{} writes, {} failed",
                report.writes.len(),
                report.failed_writes().count()
            );
            std::iter::once(summary).chain(rows).join("\n")
        }
        OutputFormat::Json => {
            let mut rows = JsonValue::new_array();
            for row in &report.readback {
                let mut obj = JsonValue::new_object();
                obj["address"] = row.address.into();
                obj["name"] = row.name.into();
                obj["value"] = match row.value {
                    Some(v) => v.into(),
                    None => JsonValue::Null,
                };
                obj["written"] = row.written.into();
                rows.push(obj)?;
            }
            let mut out = JsonValue::new_object();
            out["writes"] = report.writes.len().into();
            out["failed"] = report.failed_writes().count().into();
            out["readback"] = rows;
            json::stringify(out)
        }
    })
}

fn cmd_command(line: &str) -> Result<String> {
    let command: Command = line.parse()?;
    Ok(format!("{} -> {}", command, command.characteristic()))
}

fn cmd_decode(kind: PayloadType, payload: &str, fmt: OutputFormat) -> Result<String> {
    let bytes = payload.as_bytes();
    match kind {
        PayloadType::State => {
            let state = ble::decode_state_report(bytes).context("Bad state payload")?;
            Ok(format!("{:?}", state))
        }
        PayloadType::Patterns => {
            let patterns = ble::decode_pattern_list(bytes);
            Ok(match fmt {
                OutputFormat::Plain => slice_to_column(&patterns),
                OutputFormat::Json => {
                    let mut out = JsonValue::new_array();
                    for p in patterns {
                        let mut obj = JsonValue::new_object();
                        obj["idx"] = p.idx.into();
                        obj["name"] = p.name.into();
                        out.push(obj)?;
                    }
                    json::stringify(out)
                }
            })
        }
        PayloadType::Wifi => {
            let status = ble::decode_wifi_status(bytes).context("Bad wifi status payload")?;
            Ok(status.to_string())
        }
        PayloadType::Reply => Ok(match CommandReply::parse(bytes) {
            CommandReply::Ok(s) => format!("ok: {}", s),
            CommandReply::Fail(s) => format!("failed: {}", s),
            CommandReply::Other(s) => format!("unrecognized: {}", s),
        }),
    }
}

fn cmd_funscript(file: &std::path::Path, after: Option<u64>, fmt: OutputFormat) -> Result<String> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let script = Funscript::parse(&text)?;
    let commands = script.stream_commands_from(after);

    Ok(match fmt {
        OutputFormat::Plain => commands
            .iter()
            .map(|(at, command)| format!("{:>8} {}", at, command))
            .join("\n"),
        OutputFormat::Json => {
            let mut out = JsonValue::new_array();
            for (at, command) in commands {
                let mut obj = JsonValue::new_object();
                obj["at"] = at.into();
                obj["command"] = command.to_string().into();
                out.push(obj)?;
            }
            json::stringify(out)
        }
    })
}

async fn do_main() -> Result<String> {
    if std::env::var("GENERATE_COMPLETION").is_ok() {
        generate(Bash, &mut Cli::command(), "ossm-tool", &mut io::stdout());

        return Ok(String::default());
    }

    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(if cli.debug {
        "debug"
    } else {
        "info"
    }))
    .format_timestamp(None)
    .format_target(false)
    .init();

    let fmt = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Plain
    };
    let config = ModbusConfig {
        slave_address: cli.slave,
        repetitions: cli.repetitions,
        ..ModbusConfig::default()
    };

    match cli.command {
        Commands::ListRegisters => cmd_list_registers(fmt),
        Commands::Frame { request } => cmd_frame(config.slave_address, request),
        Commands::Crc { bytes } => cmd_crc(&bytes, fmt),
        Commands::Parse { kind, bytes } => cmd_parse(kind, &bytes, fmt),
        Commands::SimulateWrite {
            steps_per_rev,
            max_output,
            speed_kp,
            position_kp,
            reverse,
            advanced,
            reject,
            settings,
        } => {
            let motor = MotorSettings {
                steps_per_revolution: steps_per_rev,
                max_output,
                speed_kp,
                position_kp,
                direction_polarity: !reverse,
                advanced: advanced.then(AdvancedSettings::default),
            };
            cmd_simulate_write(config, motor, &settings, &reject, fmt).await
        }
        Commands::Command { line } => cmd_command(&line),
        Commands::Set { parameter, value } => Ok(ble::encode_set_command(&parameter, value)?),
        Commands::Stream {
            position,
            duration_ms,
        } => Ok(ble::encode_stream_position(position, duration_ms)),
        Commands::Wifi { ssid, password } => Ok(ble::encode_wifi_command(&ssid, &password)?),
        Commands::Decode { kind, payload } => cmd_decode(kind, &payload, fmt),
        Commands::Funscript { file, after } => cmd_funscript(&file, after, fmt),
    }
}

#[tokio::main]
async fn main() {
    match do_main().await {
        Ok(s) => println!("{}", s),
        Err(e) => error!("{:#}", e),
    }
}
