//! ST-Link/V2 and ST-Link/V3 protocol driver.

pub mod constants;
pub mod tools;
pub mod usb_interface;

use self::usb_interface::{StLinkUsb, StLinkUsbDevice, TIMEOUT};
use crate::{
    memory::ArmProbe,
    probe::{DebugProbeError, LOW_TARGET_VOLTAGE_WARNING_THRESHOLD},
};
use constants::{commands, Mode, Status, SwdFrequencyToDelayCount};
use scroll::{Pread, Pwrite, BE, LE};
use std::{cmp::Ordering, time::Duration};

/// Maximum length of 32 bit reads in bytes.
///
/// Length has been determined by experimenting with
/// a ST-Link v2.
const STLINK_MAX_READ_LEN: usize = 6144;

/// Maximum length of 32 bit writes in bytes.
/// The length is limited to the largest 16-bit value which
/// is also a multiple of 4.
const STLINK_MAX_WRITE_LEN: usize = 0xFFFC;

const DP_PORT: u16 = 0xFFFF;

/// An ST-Link in SWD mode.
///
/// Created with [`StLink::new`], which identifies the firmware. Call
/// [`StLink::attach`] before talking to the target. Dropping the driver
/// leaves debug mode again.
#[derive(Debug)]
pub struct StLink<D: StLinkUsb = StLinkUsbDevice> {
    device: D,
    name: String,
    hw_version: u8,
    jtag_version: u8,
    swd_speed_khz: u32,
    attached: bool,
    timeout: Duration,
}

impl StLink<StLinkUsbDevice> {
    /// Wraps an opened device and checks its firmware.
    pub fn new(device: StLinkUsbDevice) -> Result<Self, DebugProbeError> {
        Self::with_timeout(device, TIMEOUT)
    }

    /// Like [`StLink::new`], bounding every USB transfer by `timeout`.
    pub fn with_timeout(device: StLinkUsbDevice, timeout: Duration) -> Result<Self, DebugProbeError> {
        let name = device.info().version_name.to_string();
        let device = device.with_timeout(timeout);

        let mut stlink = Self::from_device(device, name, timeout);
        stlink.init()?;

        Ok(stlink)
    }
}

impl<D: StLinkUsb> StLink<D> {
    /// Minimum required STLink firmware version.
    const MIN_JTAG_VERSION: u8 = 26;

    /// Minimum required STLink V3 firmware version.
    ///
    /// Version 2 of the firmware (V3J2M1) has problems switching communication protocols.
    const MIN_JTAG_VERSION_V3: u8 = 3;

    fn from_device(device: D, name: String, timeout: Duration) -> Self {
        Self {
            device,
            name,
            hw_version: 0,
            jtag_version: 0,
            swd_speed_khz: SwdFrequencyToDelayCount::Hz1800000.to_khz(),
            attached: false,
            timeout,
        }
    }

    /// Human readable probe and firmware version, e.g. `ST-Link/V2 V2J37`.
    pub fn version_string(&self) -> String {
        format!(
            "ST-Link/{} V{}J{}",
            self.name, self.hw_version, self.jtag_version
        )
    }

    /// The SWD clock currently configured, in kHz.
    pub fn speed_khz(&self) -> u32 {
        self.swd_speed_khz
    }

    /// Enters SWD mode and configures the SWD clock.
    ///
    /// The requested speed is rounded down to the next setting the probe
    /// supports. Returns the speed actually used.
    pub fn attach(&mut self, speed_khz: u32) -> Result<u32, DebugProbeError> {
        tracing::debug!("attach(SWD, {} kHz)", speed_khz);
        self.enter_idle()?;

        // Check and report the target voltage.
        let target_voltage = self.get_target_voltage()?;
        if target_voltage < LOW_TARGET_VOLTAGE_WARNING_THRESHOLD {
            tracing::warn!(
                "Target voltage (VAPP) is {:2.2} V. Is your target device powered?",
                target_voltage
            );
        } else {
            tracing::debug!("Target voltage (VAPP): {:2.2} V", target_voltage);
        }

        let mut buf = [0; 2];
        self.send_jtag_command(
            &[
                commands::JTAG_COMMAND,
                commands::JTAG_ENTER2,
                commands::JTAG_ENTER_SWD,
                0,
            ],
            &[],
            &mut buf,
        )?;
        self.attached = true;

        tracing::debug!("Successfully initialized SWD.");

        self.set_speed(speed_khz)
    }

    fn set_speed(&mut self, speed_khz: u32) -> Result<u32, DebugProbeError> {
        match self.hw_version.cmp(&3) {
            Ordering::Less => {
                let actual_speed = SwdFrequencyToDelayCount::find_setting(speed_khz)
                    .ok_or(DebugProbeError::UnsupportedSpeed(speed_khz))?;

                self.set_swd_frequency(actual_speed)?;
                self.swd_speed_khz = actual_speed.to_khz();
            }
            Ordering::Equal | Ordering::Greater => {
                let (available, _) = self.get_communication_frequencies()?;

                let actual_speed_khz = available
                    .into_iter()
                    .filter(|speed| *speed <= speed_khz)
                    .max()
                    .ok_or(DebugProbeError::UnsupportedSpeed(speed_khz))?;

                self.set_communication_frequency(actual_speed_khz)?;
                self.swd_speed_khz = actual_speed_khz;
            }
        }

        tracing::debug!("SWD speed set to {} kHz", self.swd_speed_khz);

        Ok(self.swd_speed_khz)
    }

    /// Reads the target voltage in volts.
    pub fn get_target_voltage(&mut self) -> Result<f32, DebugProbeError> {
        let mut buf = [0; 8];
        self.device
            .write(&[commands::GET_TARGET_VOLTAGE], &[], &mut buf, self.timeout)?;

        let a0 = buf.pread_with::<u32>(0, LE).map_err(StlinkError::from)?;
        let a1 = buf.pread_with::<u32>(4, LE).map_err(StlinkError::from)?;
        if a0 != 0 {
            Ok(2. * (a1 as f32) * 1.2 / (a0 as f32))
        } else {
            // Should never happen
            Err(StlinkError::VoltageDivisionByZero.into())
        }
    }

    /// Reads the IDCODE register of the SW-DP.
    ///
    /// Fails when no target answers on the SWD lines.
    pub fn read_idcode(&mut self) -> Result<u32, DebugProbeError> {
        let idcode = self.read_dap_register(DP_PORT, 0)?;
        tracing::debug!("DP IDCODE: {:08x}", idcode);
        Ok(idcode)
    }

    /// Get the current mode of the ST-Link
    fn get_current_mode(&mut self) -> Result<Mode, DebugProbeError> {
        tracing::trace!("Getting current mode of device...");
        let mut buf = [0; 2];
        self.device
            .write(&[commands::GET_CURRENT_MODE], &[], &mut buf, self.timeout)?;

        let mode = match buf[0] {
            0 => Mode::Dfu,
            1 => Mode::MassStorage,
            2 => Mode::Jtag,
            3 => Mode::Swim,
            _ => return Err(StlinkError::UnknownMode.into()),
        };

        tracing::debug!("Current device mode: {:?}", mode);

        Ok(mode)
    }

    /// Commands the ST-Link to enter idle mode.
    /// Internal helper.
    fn enter_idle(&mut self) -> Result<(), DebugProbeError> {
        let mode = self.get_current_mode()?;

        match mode {
            Mode::Dfu => self.device.write(
                &[commands::DFU_COMMAND, commands::DFU_EXIT],
                &[],
                &mut [],
                self.timeout,
            ),
            Mode::Swim => self.device.write(
                &[commands::SWIM_COMMAND, commands::SWIM_EXIT],
                &[],
                &mut [],
                self.timeout,
            ),
            _ => Ok(()),
        }
    }

    /// Reads the ST-Links version.
    /// Returns a tuple (hardware version, firmware version).
    /// This method stores the version data on the struct to make later use of it.
    fn get_version(&mut self) -> Result<(u8, u8), DebugProbeError> {
        const HW_VERSION_SHIFT: u8 = 12;
        const HW_VERSION_MASK: u8 = 0x0F;
        const JTAG_VERSION_SHIFT: u8 = 6;
        const JTAG_VERSION_MASK: u8 = 0x3F;
        // GET_VERSION response structure:
        //   Byte 0-1:
        //     [15:12] Major/HW version
        //     [11:6]  JTAG/SWD version
        //     [5:0]   SWIM or MSC version
        //   Byte 2-3: ST_VID
        //   Byte 4-5: STLINK_PID
        let mut buf = [0; 6];
        self.device
            .write(&[commands::GET_VERSION], &[], &mut buf, self.timeout)?;

        let version: u16 = buf.pread_with(0, BE).map_err(StlinkError::from)?;
        self.hw_version = (version >> HW_VERSION_SHIFT) as u8 & HW_VERSION_MASK;
        self.jtag_version = (version >> JTAG_VERSION_SHIFT) as u8 & JTAG_VERSION_MASK;

        // For the STLinkV3 we must use the extended get version command.
        if self.hw_version >= 3 {
            // GET_VERSION_EXT response structure (byte offsets)
            //  0: HW version
            //  1: SWIM version
            //  2: JTAG/SWD version
            //  3: MSC/VCP version
            //  4: Bridge version
            //  5-7: reserved
            //  8-9: ST_VID
            //  10-11: STLINK_PID
            let mut buf = [0; 12];
            self.device
                .write(&[commands::GET_VERSION_EXT], &[], &mut buf, self.timeout)?;
            self.jtag_version = buf[2];
        }

        // Make sure everything is okay with the firmware we use.
        if self.jtag_version == 0 {
            Err(StlinkError::JTAGNotSupportedOnProbe.into())
        } else if (self.hw_version < 3 && self.jtag_version < Self::MIN_JTAG_VERSION)
            || (self.hw_version == 3 && self.jtag_version < Self::MIN_JTAG_VERSION_V3)
        {
            Err(DebugProbeError::ProbeFirmwareOutdated)
        } else {
            Ok((self.hw_version, self.jtag_version))
        }
    }

    /// Brings the ST-Link into idle mode and identifies its firmware.
    /// Internal helper.
    fn init(&mut self) -> Result<(), DebugProbeError> {
        tracing::debug!("Initializing STLink...");

        self.enter_idle()?;

        let version = self.get_version()?;
        tracing::debug!("STLink version: {:?}", version);

        Ok(())
    }

    /// Sets the SWD frequency (V2 only).
    fn set_swd_frequency(
        &mut self,
        frequency: SwdFrequencyToDelayCount,
    ) -> Result<(), DebugProbeError> {
        let mut buf = [0; 2];
        self.send_jtag_command(
            &[
                commands::JTAG_COMMAND,
                commands::SWD_SET_FREQ,
                frequency as u8,
            ],
            &[],
            &mut buf,
        )
    }

    /// Sets the communication frequency (V3 only)
    fn set_communication_frequency(&mut self, frequency_khz: u32) -> Result<(), DebugProbeError> {
        if self.hw_version < 3 {
            return Err(DebugProbeError::CommandNotSupportedByProbe);
        }

        let mut command = vec![
            commands::JTAG_COMMAND,
            commands::SET_COM_FREQ,
            commands::JTAG_STLINK_SWD_COM,
            0,
        ];
        command.extend_from_slice(&frequency_khz.to_le_bytes());

        let mut buf = [0; 8];
        self.send_jtag_command(&command, &[], &mut buf)
    }

    /// Returns the available and current SWD frequencies (V3 only)
    fn get_communication_frequencies(&mut self) -> Result<(Vec<u32>, u32), DebugProbeError> {
        if self.hw_version < 3 {
            return Err(DebugProbeError::CommandNotSupportedByProbe);
        }

        let mut buf = [0; 52];
        self.send_jtag_command(
            &[
                commands::JTAG_COMMAND,
                commands::GET_COM_FREQ,
                commands::JTAG_STLINK_SWD_COM,
            ],
            &[],
            &mut buf,
        )?;

        let mut values = buf
            .chunks(4)
            .map(|chunk| chunk.pread_with::<u32>(0, LE))
            .collect::<Result<Vec<u32>, _>>()
            .map_err(StlinkError::from)?;

        let current = values[1];
        let n = std::cmp::min(values[2], 10) as usize;

        values.rotate_left(3);
        values.truncate(n);

        Ok((values, current))
    }

    /// Sends a JTAG command and checks the status byte of the response.
    ///
    /// `SwdDpWait` and `SwdApWait` are retried with an exponential backoff.
    fn send_jtag_command(
        &mut self,
        cmd: &[u8],
        write_data: &[u8],
        read_data: &mut [u8],
    ) -> Result<(), DebugProbeError> {
        for attempt in 0..13 {
            self.device.write(cmd, write_data, read_data, self.timeout)?;

            match Status::from(read_data[0]) {
                Status::JtagOk => return Ok(()),
                Status::SwdDpWait => {
                    tracing::warn!("send_jtag_command {} got SwdDpWait, retrying", cmd[1])
                }
                Status::SwdApWait => {
                    tracing::warn!("send_jtag_command {} got SwdApWait, retrying", cmd[1])
                }
                status => {
                    tracing::warn!("send_jtag_command {} failed: {:?}", cmd[1], status);
                    return Err(StlinkError::CommandFailed(status).into());
                }
            }

            // Sleep with exponential backoff.
            std::thread::sleep(Duration::from_micros(100 << attempt));
        }

        tracing::warn!("too many retries, giving up");

        // Return the last error (will be SwdDpWait or SwdApWait)
        let status = Status::from(read_data[0]);
        Err(StlinkError::CommandFailed(status).into())
    }

    fn get_last_rw_status(&mut self) -> Result<(), DebugProbeError> {
        let mut receive_buffer = [0u8; 12];
        self.send_jtag_command(
            &[commands::JTAG_COMMAND, commands::JTAG_GETLASTRWSTATUS2],
            &[],
            &mut receive_buffer,
        )
    }

    /// Reads the DAP register on the specified port and address.
    fn read_dap_register(&mut self, port: u16, addr: u8) -> Result<u32, DebugProbeError> {
        if port == DP_PORT && addr & 0xf0 != 0 {
            return Err(StlinkError::BanksNotAllowedOnDPRegister.into());
        }

        let port = port.to_le_bytes();

        let cmd = &[
            commands::JTAG_COMMAND,
            commands::JTAG_READ_DAP_REG,
            port[0],
            port[1],
            addr,
            0, // Maximum address for DAP registers is 0xFC
        ];
        let mut buf = [0; 8];
        self.send_jtag_command(cmd, &[], &mut buf)?;

        Ok(buf.pread_with(4, LE).map_err(StlinkError::from)?)
    }

    /// Largest 8 bit read issued in one command.
    fn max_8bit_read_len(&self) -> usize {
        if self.hw_version < 3 {
            64
        } else {
            // 255 bytes is the empirical limit on V3, stay well below it.
            128
        }
    }

    /// Largest 8 bit write issued in one command.
    fn max_8bit_write_len(&self) -> usize {
        if self.hw_version < 3 {
            64
        } else {
            512
        }
    }

    fn read_mem_32bit(&mut self, address: u32, data: &mut [u8]) -> Result<(), DebugProbeError> {
        tracing::debug!(
            "Read mem 32 bit, address={:08x}, length={}",
            address,
            data.len()
        );

        // Ensure maximum read length is not exceeded.
        assert!(
            data.len() <= STLINK_MAX_READ_LEN,
            "Maximum read length for STLink is {} bytes",
            STLINK_MAX_READ_LEN
        );

        assert!(
            data.len() % 4 == 0,
            "Data length has to be a multiple of 4 for 32 bit reads"
        );

        if address % 4 != 0 {
            return Err(StlinkError::UnalignedAddress(address).into());
        }

        let addbytes = address.to_le_bytes();
        let lenbytes = (data.len() as u16).to_le_bytes();
        self.device.write(
            &[
                commands::JTAG_COMMAND,
                commands::JTAG_READMEM_32BIT,
                addbytes[0],
                addbytes[1],
                addbytes[2],
                addbytes[3],
                lenbytes[0],
                lenbytes[1],
            ],
            &[],
            data,
            self.timeout,
        )?;

        self.get_last_rw_status()
    }

    fn read_mem_8bit(&mut self, address: u32, data: &mut [u8]) -> Result<(), DebugProbeError> {
        let length = data.len();
        assert!(
            length <= self.max_8bit_read_len(),
            "8-Bit reads are limited to {} bytes on this ST-Link",
            self.max_8bit_read_len()
        );

        // The receive buffer must be at least two bytes in size, otherwise
        // a USB overflow error occurs.
        let mut receive_buffer = vec![0u8; length.max(2)];

        tracing::debug!("Read mem 8 bit, address={:08x}, length={}", address, length);

        let addbytes = address.to_le_bytes();
        let lenbytes = (length as u16).to_le_bytes();
        self.device.write(
            &[
                commands::JTAG_COMMAND,
                commands::JTAG_READMEM_8BIT,
                addbytes[0],
                addbytes[1],
                addbytes[2],
                addbytes[3],
                lenbytes[0],
                lenbytes[1],
            ],
            &[],
            &mut receive_buffer,
            self.timeout,
        )?;

        data.copy_from_slice(&receive_buffer[..length]);

        self.get_last_rw_status()
    }

    fn write_mem_32bit(&mut self, address: u32, data: &[u8]) -> Result<(), DebugProbeError> {
        tracing::trace!("write_mem_32bit");
        let length = data.len();

        // Maximum supported read length is 2^16 bytes.
        assert!(
            length <= STLINK_MAX_WRITE_LEN,
            "Maximum write length for STLink is {} bytes",
            STLINK_MAX_WRITE_LEN
        );

        assert!(
            length % 4 == 0,
            "Data length has to be a multiple of 4 for 32 bit writes"
        );

        if address % 4 != 0 {
            return Err(StlinkError::UnalignedAddress(address).into());
        }

        let addbytes = address.to_le_bytes();
        let lenbytes = (length as u16).to_le_bytes();
        self.device.write(
            &[
                commands::JTAG_COMMAND,
                commands::JTAG_WRITEMEM_32BIT,
                addbytes[0],
                addbytes[1],
                addbytes[2],
                addbytes[3],
                lenbytes[0],
                lenbytes[1],
            ],
            data,
            &mut [],
            self.timeout,
        )?;

        self.get_last_rw_status()
    }

    fn write_mem_8bit(&mut self, address: u32, data: &[u8]) -> Result<(), DebugProbeError> {
        tracing::trace!("write_mem_8bit");
        let byte_length = data.len();

        assert!(
            byte_length <= self.max_8bit_write_len(),
            "8-Bit writes are limited to {} bytes on this ST-Link",
            self.max_8bit_write_len()
        );

        let addbytes = address.to_le_bytes();
        let lenbytes = (byte_length as u16).to_le_bytes();
        self.device.write(
            &[
                commands::JTAG_COMMAND,
                commands::JTAG_WRITEMEM_8BIT,
                addbytes[0],
                addbytes[1],
                addbytes[2],
                addbytes[3],
                lenbytes[0],
                lenbytes[1],
            ],
            data,
            &mut [],
            self.timeout,
        )?;

        self.get_last_rw_status()
    }

    /// 8 bit reads of any length, split into commands the probe accepts.
    fn read_8bit_chunked(&mut self, address: u32, data: &mut [u8]) -> Result<(), DebugProbeError> {
        let chunk_size = self.max_8bit_read_len();
        let mut current_address = address;

        for chunk in data.chunks_mut(chunk_size) {
            self.read_mem_8bit(current_address, chunk)?;
            current_address = current_address.wrapping_add(chunk.len() as u32);
        }

        Ok(())
    }

    fn write_8bit_chunked(&mut self, address: u32, data: &[u8]) -> Result<(), DebugProbeError> {
        let chunk_size = self.max_8bit_write_len();
        let mut current_address = address;

        for chunk in data.chunks(chunk_size) {
            self.write_mem_8bit(current_address, chunk)?;
            current_address = current_address.wrapping_add(chunk.len() as u32);
        }

        Ok(())
    }

    fn read_debug_reg(&mut self, address: u32) -> Result<u32, DebugProbeError> {
        tracing::trace!("Read debug reg {:08x}", address);
        let mut buff = [0u8; 8];

        let addbytes = address.to_le_bytes();
        self.send_jtag_command(
            &[
                commands::JTAG_COMMAND,
                commands::JTAG_READ_DEBUG_REG,
                addbytes[0],
                addbytes[1],
                addbytes[2],
                addbytes[3],
            ],
            &[],
            &mut buff,
        )?;

        Ok(buff.pread_with(4, LE).map_err(StlinkError::from)?)
    }

    fn write_debug_reg(&mut self, address: u32, value: u32) -> Result<(), DebugProbeError> {
        tracing::trace!("Write debug reg {:08x}", address);
        let mut buff = [0u8; 2];

        let mut cmd = [0u8; 2 + 4 + 4];
        cmd[0] = commands::JTAG_COMMAND;
        cmd[1] = commands::JTAG_WRITE_DEBUG_REG;

        cmd.pwrite_with(address, 2, LE).map_err(StlinkError::from)?;
        cmd.pwrite_with(value, 6, LE).map_err(StlinkError::from)?;

        self.send_jtag_command(&cmd, &[], &mut buff)
    }

    fn read_core_register(&mut self, index: u8) -> Result<u32, DebugProbeError> {
        tracing::trace!("Read core reg {:02x}", index);
        let mut buff = [0u8; 8];

        self.send_jtag_command(
            &[commands::JTAG_COMMAND, commands::JTAG_READ_CORE_REG, index],
            &[],
            &mut buff,
        )?;

        Ok(buff.pread_with(4, LE).map_err(StlinkError::from)?)
    }

    fn write_core_register(&mut self, index: u8, value: u32) -> Result<(), DebugProbeError> {
        tracing::trace!("Write core reg {:02x}", index);
        let mut buff = [0u8; 2];

        let mut cmd = [0u8; 2 + 1 + 4];
        cmd[0] = commands::JTAG_COMMAND;
        cmd[1] = commands::JTAG_WRITE_CORE_REG;
        cmd[2] = index;

        cmd.pwrite_with(value, 3, LE).map_err(StlinkError::from)?;

        self.send_jtag_command(&cmd, &[], &mut buff)
    }
}

impl<D: StLinkUsb> Drop for StLink<D> {
    fn drop(&mut self) {
        // We ignore the error cases as we can't do much about it anyways.
        if self.attached {
            let mut buf = [0; 2];
            let _ = self.device.write(
                &[commands::JTAG_COMMAND, commands::JTAG_EXIT],
                &[],
                &mut buf,
                self.timeout,
            );
        }
        let _ = self.enter_idle();
    }
}

impl<D: StLinkUsb> ArmProbe for StLink<D> {
    fn read_8(&mut self, address: u32, data: &mut [u8]) -> Result<(), DebugProbeError> {
        if data.len() <= self.max_8bit_read_len() {
            return self.read_8bit_chunked(address, data);
        }

        // Unaligned head and tail go through 8 bit reads, the rest through 32 bit reads.
        let head = ((4 - address % 4) % 4) as usize;
        let (head_data, rest) = data.split_at_mut(head);
        let aligned_len = rest.len() / 4 * 4;
        let (middle, tail) = rest.split_at_mut(aligned_len);

        self.read_8bit_chunked(address, head_data)?;

        let mut current_address = address.wrapping_add(head as u32);

        for chunk in middle.chunks_mut(STLINK_MAX_READ_LEN) {
            self.read_mem_32bit(current_address, chunk)?;
            current_address = current_address.wrapping_add(chunk.len() as u32);
        }

        self.read_8bit_chunked(current_address, tail)
    }

    fn write_8(&mut self, address: u32, data: &[u8]) -> Result<(), DebugProbeError> {
        // If we write less than one 8 bit command, just write it directly
        if data.len() < self.max_8bit_write_len() {
            tracing::trace!("write_8: small - direct 8 bit write to {:08x}", address);
            return self.write_mem_8bit(address, data);
        }

        // Handle unaligned data in the beginning.
        let bytes_beginning = ((4 - address % 4) % 4) as usize;

        let mut current_address = address;

        if bytes_beginning > 0 {
            tracing::trace!(
                "write_8: at_begin - unaligned write of {} bytes to address {:08x}",
                bytes_beginning,
                current_address,
            );
            self.write_mem_8bit(current_address, &data[..bytes_beginning])?;

            current_address = current_address.wrapping_add(bytes_beginning as u32);
        }

        let aligned_len = ((data.len() - bytes_beginning) / 4) * 4;

        tracing::trace!(
            "write_8: aligned write of {} bytes to address {:08x}",
            aligned_len,
            current_address,
        );

        for chunk in data[bytes_beginning..(bytes_beginning + aligned_len)].chunks(STLINK_MAX_WRITE_LEN) {
            self.write_mem_32bit(current_address, chunk)?;
            current_address = current_address.wrapping_add(chunk.len() as u32);
        }

        let remaining_bytes = &data[bytes_beginning + aligned_len..];

        if !remaining_bytes.is_empty() {
            tracing::trace!(
                "write_8: at_end - unaligned write of {} bytes to address {:08x}",
                remaining_bytes.len(),
                current_address,
            );
            self.write_8bit_chunked(current_address, remaining_bytes)?;
        }

        Ok(())
    }

    fn read_word_32(&mut self, address: u32) -> Result<u32, DebugProbeError> {
        if address % 4 != 0 {
            return Err(StlinkError::UnalignedAddress(address).into());
        }
        self.read_debug_reg(address)
    }

    fn write_word_32(&mut self, address: u32, value: u32) -> Result<(), DebugProbeError> {
        if address % 4 != 0 {
            return Err(StlinkError::UnalignedAddress(address).into());
        }
        self.write_debug_reg(address, value)
    }

    fn read_core_reg(&mut self, index: u8) -> Result<u32, DebugProbeError> {
        self.read_core_register(index)
    }

    fn write_core_reg(&mut self, index: u8, value: u32) -> Result<(), DebugProbeError> {
        self.write_core_register(index, value)
    }
}

#[derive(thiserror::Error, Debug)]
pub(crate) enum StlinkError {
    #[error("Invalid voltage values returned by probe.")]
    VoltageDivisionByZero,
    #[error("Probe is an unknown mode.")]
    UnknownMode,
    #[error("STLink does not support accessing banked DP registers.")]
    BanksNotAllowedOnDPRegister,
    #[error("Command failed with status {0:?}")]
    CommandFailed(Status),
    #[error("JTAG not supported on Probe")]
    JTAGNotSupportedOnProbe,
    #[error("Address {0:#010x} is not 32 bit aligned")]
    UnalignedAddress(u32),
    #[error("Malformed response from probe")]
    MalformedResponse(#[from] scroll::Error),
}

impl From<StlinkError> for DebugProbeError {
    fn from(e: StlinkError) -> Self {
        DebugProbeError::ProbeSpecific(Box::new(e))
    }
}
