//! Burst legality checks applied by the controller at grant time.

use crate::bus::BurstRequest;
use crate::fault::{Fault, FaultCode};
use crate::memory::map::ADDRESS_SPACE_LIMIT;

/// Byte width of one bus word.
pub const WORD_ACCESS_BYTES: u8 = 2;

/// Validates word alignment of a byte address.
///
/// # Errors
///
/// Returns [`FaultCode::UnalignedAddress`] when `addr` is odd.
pub const fn validate_word_alignment(addr: u32) -> Result<(), FaultCode> {
    if addr & 1 == 0 {
        Ok(())
    } else {
        Err(FaultCode::UnalignedAddress)
    }
}

/// Validates a burst length against the controller ceiling.
///
/// # Errors
///
/// Returns [`FaultCode::EmptyBurst`] for zero words and
/// [`FaultCode::BurstTooLong`] above `ceiling`.
pub const fn validate_burst_length(length: u16, ceiling: u16) -> Result<(), FaultCode> {
    if length == 0 {
        Err(FaultCode::EmptyBurst)
    } else if length > ceiling {
        Err(FaultCode::BurstTooLong)
    } else {
        Ok(())
    }
}

/// Validates that every word of a burst lies inside the 24-bit space and the
/// backing store.
///
/// # Errors
///
/// Returns [`FaultCode::AddressOutOfRange`] when any word falls outside.
pub const fn validate_burst_range(
    address: u32,
    length: u16,
    store_bytes: u32,
) -> Result<(), FaultCode> {
    let end = address as u64 + 2 * length as u64;
    if end > store_bytes as u64 || end > ADDRESS_SPACE_LIMIT as u64 {
        Err(FaultCode::AddressOutOfRange)
    } else {
        Ok(())
    }
}

/// Applies every burst check and tags the fault with the requesting client.
///
/// # Errors
///
/// Returns the first failing check as a [`Fault`]; the detail carries the
/// offending length or address.
pub fn validate_burst(
    request: &BurstRequest,
    ceiling: u16,
    store_bytes: u32,
) -> Result<(), Fault> {
    validate_burst_length(request.length, ceiling).map_err(|code| {
        Fault::new(code)
            .with_client(request.client)
            .with_detail(u32::from(request.length))
    })?;
    validate_word_alignment(request.address)
        .and_then(|()| validate_burst_range(request.address, request.length, store_bytes))
        .map_err(|code| {
            Fault::new(code)
                .with_client(request.client)
                .with_detail(request.address)
        })
}

#[cfg(test)]
mod tests {
    use super::{
        validate_burst, validate_burst_length, validate_burst_range, validate_word_alignment,
    };
    use crate::bus::{BurstRequest, ClientId};
    use crate::fault::FaultCode;

    #[test]
    fn alignment_rejects_odd_addresses() {
        assert_eq!(validate_word_alignment(0x1000), Ok(()));
        assert_eq!(
            validate_word_alignment(0x1001),
            Err(FaultCode::UnalignedAddress)
        );
    }

    #[test]
    fn length_must_be_between_one_and_ceiling() {
        assert_eq!(validate_burst_length(0, 256), Err(FaultCode::EmptyBurst));
        assert_eq!(validate_burst_length(1, 256), Ok(()));
        assert_eq!(validate_burst_length(256, 256), Ok(()));
        assert_eq!(validate_burst_length(257, 256), Err(FaultCode::BurstTooLong));
    }

    #[test]
    fn range_covers_last_word_of_burst() {
        assert_eq!(validate_burst_range(0x00, 4, 8), Ok(()));
        assert_eq!(
            validate_burst_range(0x02, 4, 8),
            Err(FaultCode::AddressOutOfRange)
        );
        assert_eq!(
            validate_burst_range(0xFF_FFFE, 2, u32::MAX),
            Err(FaultCode::AddressOutOfRange)
        );
    }

    #[test]
    fn combined_validation_tags_client_and_detail() {
        let fault = validate_burst(&BurstRequest::read(ClientId::Monitor, 0, 300), 256, 1024)
            .expect_err("burst above ceiling");
        assert_eq!(fault.code, FaultCode::BurstTooLong);
        assert_eq!(fault.client, Some(ClientId::Monitor));
        assert_eq!(fault.detail, 300);

        let fault = validate_burst(&BurstRequest::write(ClientId::Processor, 3, 1), 256, 1024)
            .expect_err("odd address");
        assert_eq!(fault.code, FaultCode::UnalignedAddress);
        assert_eq!(fault.detail, 3);
    }
}
