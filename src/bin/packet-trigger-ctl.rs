//! Host-side control tool: claims the analyzer's vendor interface,
//! configures/arms the trigger, and streams+demultiplexes the bulk packet
//! record endpoint into readable lines.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use nusb::transfer::{Control, ControlType, Recipient as NusbRecipient, TransferError};
use nusb::DeviceInfo;
use structopt::StructOpt;

use packet_trigger::event::EventCode;
use packet_trigger::stream::{ParseOutcome, Record, RecordReader};
use packet_trigger::vendor::requests::{
    VendorRequest, TRIGGER_CONTROL_PAYLOAD_LEN, TRIGGER_STAGE_PAYLOAD_LEN,
};

/// Vendor/product ID of the analyzer's vendor interface.
const VID_PID: (u16, u16) = (0x1d50, 0x615b);
const BULK_IN_ENDPOINT: u8 = 0x81;
const READ_CHUNK: usize = 512;
const CONTROL_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(StructOpt)]
#[structopt(about = "Configure and read from an FPGA USB bus analyzer's trigger engine")]
enum Opt {
    /// Read and print GET_STATE / GET_SPEEDS / GET_MINOR_VERSION / GET_TRIGGER_STATUS.
    Status,
    /// Write the 1-byte state register.
    SetState { byte: u8 },
    /// Arm the trigger sequence.
    Arm,
    /// Disarm the trigger sequence.
    Disarm,
    /// Set trigger control: enable, output toggle enable, and stage count.
    SetTriggerControl {
        enable: bool,
        output_enable: bool,
        stage_count: u8,
    },
    /// Write one trigger stage's offset/length/pattern/mask (hex strings).
    SetTriggerStage {
        stage: u8,
        offset: u16,
        length: u8,
        pattern_hex: String,
        mask_hex: String,
    },
    /// Read one trigger stage back.
    GetTriggerStage { stage: u8 },
    /// Stream the bulk packet/event record endpoint and print each record.
    Stream,
}

fn open_interface() -> Result<nusb::Interface> {
    let device_info = find_device()?;
    let device = device_info.open().context("failed to open device")?;
    device.claim_interface(0).context("failed to claim vendor interface")
}

fn find_device() -> Result<DeviceInfo> {
    nusb::list_devices()
        .context("failed to list USB devices")?
        .find(|d| (d.vendor_id(), d.product_id()) == VID_PID)
        .ok_or_else(|| anyhow!("no analyzer device found (vid:pid {:04x}:{:04x})", VID_PID.0, VID_PID.1))
}

fn control_out(interface: &nusb::Interface, request: VendorRequest, value: u16, data: &[u8]) -> Result<()> {
    let control = Control {
        control_type: ControlType::Vendor,
        recipient: NusbRecipient::Interface,
        request: u8::from(request),
        value,
        index: 0,
    };
    match interface.control_out_blocking(control, data, CONTROL_TIMEOUT) {
        Ok(_) => Ok(()),
        Err(TransferError::Stall) if matches!(request, VendorRequest::DisarmTrigger) => {
            // Disarming an already-disarmed trigger can STALL; treat it as
            // a no-op the way an idempotent stop command is tolerated.
            warn!("disarm stalled; trigger was likely already disarmed");
            Ok(())
        }
        Err(err) => Err(anyhow!("control OUT request {:?} failed: {err}", request)),
    }
}

fn control_in(interface: &nusb::Interface, request: VendorRequest, value: u16, len: usize) -> Result<Vec<u8>> {
    let control = Control {
        control_type: ControlType::Vendor,
        recipient: NusbRecipient::Interface,
        request: u8::from(request),
        value,
        index: 0,
    };
    let mut buf = vec![0u8; len];
    let n = interface
        .control_in_blocking(control, &mut buf, CONTROL_TIMEOUT)
        .map_err(|err| anyhow!("control IN request {:?} failed: {err}", request))?;
    buf.truncate(n);
    Ok(buf)
}

fn parse_hex_bytes(s: &str, len: usize) -> Result<Vec<u8>> {
    let bytes = (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16))
        .collect::<std::result::Result<Vec<u8>, _>>()
        .context("pattern/mask must be hex-encoded bytes")?;
    if bytes.len() != len {
        return Err(anyhow!("expected {} bytes, got {}", len, bytes.len()));
    }
    Ok(bytes)
}

fn print_record(record: &Record) {
    match record {
        Record::Packet { timestamp, payload } => {
            println!("packet t={:#06x} len={} {:02x?}", timestamp, payload.len(), payload);
        }
        Record::Event { code, timestamp } => match code {
            EventCode::Rollover => println!("event t={:#06x} rollover", timestamp),
            EventCode::CaptureStop => println!("event t={:#06x} capture-stop", timestamp),
            EventCode::CaptureStart(speed) => {
                println!("event t={:#06x} capture-start speed={:?}", timestamp, speed)
            }
            EventCode::TriggerFired => println!("event t={:#06x} trigger-fired", timestamp),
            EventCode::Other(code) => println!("event t={:#06x} other(0x{:02x})", timestamp, code),
        },
    }
}

fn run(opt: Opt) -> Result<()> {
    match opt {
        Opt::Status => {
            let interface = open_interface()?;
            let state = control_in(&interface, VendorRequest::GetState, 0, 1)?;
            let speeds = control_in(&interface, VendorRequest::GetSpeeds, 0, 1)?;
            let version = control_in(&interface, VendorRequest::GetMinorVersion, 0, 1)?;
            let status = control_in(&interface, VendorRequest::GetTriggerStatus, 0, 5)?;
            println!("state:   {:#04x}", state[0]);
            println!("speeds:  {:#04x}", speeds[0]);
            println!("version: {}", version[0]);
            println!(
                "trigger: flags={:#04x} sequence_stage={} fire_count={} stage_count={}",
                status[0],
                status[1],
                u16::from_le_bytes([status[2], status[3]]),
                status[4]
            );
        }
        Opt::SetState { byte } => {
            let interface = open_interface()?;
            control_out(&interface, VendorRequest::SetState, 0, &[byte])?;
            info!("state register set to {:#04x}", byte);
        }
        Opt::Arm => {
            let interface = open_interface()?;
            control_out(&interface, VendorRequest::ArmTrigger, 0, &[])?;
            info!("trigger armed");
        }
        Opt::Disarm => {
            let interface = open_interface()?;
            control_out(&interface, VendorRequest::DisarmTrigger, 0, &[])?;
            info!("trigger disarmed");
        }
        Opt::SetTriggerControl {
            enable,
            output_enable,
            stage_count,
        } => {
            let interface = open_interface()?;
            let flags = (enable as u8) | (output_enable as u8) << 1;
            let mut payload = [0u8; TRIGGER_CONTROL_PAYLOAD_LEN];
            payload[0] = flags;
            payload[1] = stage_count;
            control_out(&interface, VendorRequest::SetTriggerControl, 0, &payload)?;
            info!("trigger control set: enable={enable} output_enable={output_enable} stage_count={stage_count}");
        }
        Opt::SetTriggerStage {
            stage,
            offset,
            length,
            pattern_hex,
            mask_hex,
        } => {
            let interface = open_interface()?;
            let pattern = parse_hex_bytes(&pattern_hex, 32)?;
            let mask = parse_hex_bytes(&mask_hex, 32)?;
            let mut payload = Vec::with_capacity(TRIGGER_STAGE_PAYLOAD_LEN);
            payload.extend_from_slice(&offset.to_le_bytes());
            payload.push(length);
            payload.push(0);
            payload.extend_from_slice(&pattern);
            payload.extend_from_slice(&mask);
            control_out(&interface, VendorRequest::SetTriggerStage, stage as u16, &payload)?;
            info!("stage {stage} written: offset={offset} length={length}");
        }
        Opt::GetTriggerStage { stage } => {
            let interface = open_interface()?;
            let payload = control_in(&interface, VendorRequest::GetTriggerStage, stage as u16, TRIGGER_STAGE_PAYLOAD_LEN)?;
            let offset = u16::from_le_bytes([payload[0], payload[1]]);
            println!("stage {stage}: offset={offset} length={}", payload[2]);
            println!("  pattern: {:02x?}", &payload[4..36]);
            println!("  mask:    {:02x?}", &payload[36..68]);
        }
        Opt::Stream => {
            let interface = open_interface()?;
            let mut buffer = Vec::new();
            let reader = RecordReader::new();
            loop {
                let mut chunk = vec![0u8; READ_CHUNK];
                let n = match interface.bulk_in_blocking(BULK_IN_ENDPOINT, &mut chunk, CONTROL_TIMEOUT) {
                    Ok(n) => n,
                    Err(TransferError::Cancelled) => break,
                    Err(err) => return Err(anyhow!("bulk read failed: {err}")),
                };
                if n == 0 {
                    break;
                }
                buffer.extend_from_slice(&chunk[..n]);
                loop {
                    match reader.pull(&buffer) {
                        ParseOutcome::Parsed { record, consumed } => {
                            print_record(&record);
                            buffer.drain(..consumed);
                        }
                        ParseOutcome::NeedMoreData => break,
                    }
                }
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let opt = Opt::from_args();
    run(opt)
}
