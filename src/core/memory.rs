use super::gas::GasMeter;
use super::params::*;
use super::ExecError;
use crate::common::{checked_as_u64, Gas, U256};

/// Byte-addressed scratch memory of a frame. It grows in 32-byte words and
/// each growth is charged by the quadratic memory fee.
pub struct Memory {
    space: Vec<u8>,
    paid: Gas,
}

#[inline(always)]
fn words(size: u64) -> u64 {
    (size >> 5) + ((size & 31 != 0) as u64)
}

/// Total fee for a memory of `w` words.
#[inline(always)]
fn fee(w: u64) -> Gas {
    w * GAS_MEM_RESIZE_WORD + w * w / QUAD_COEF_DIV
}

impl Memory {
    pub fn new() -> Self {
        Self {
            space: Vec::new(),
            paid: 0,
        }
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.space.len()
    }

    /// Grow the memory to cover `[off, off + len)`, charging the growth to
    /// `gas` before any allocation happens. A zero-length range touches
    /// nothing.
    pub fn expand(
        &mut self, off: &U256, len: &U256, gas: &mut GasMeter,
    ) -> Result<(), ExecError> {
        if len.is_zero() {
            return Ok(())
        }
        let end = off
            .checked_add(*len)
            .and_then(|e| checked_as_u64(&e))
            .filter(|e| *e <= MAX_MEM_SIZE as u64)
            .ok_or(ExecError::OutOfMemory)?;
        if end <= self.space.len() as u64 {
            return Ok(())
        }
        let w = words(end);
        let total = fee(w);
        gas.charge(total - self.paid)?;
        self.paid = total;
        self.space.resize((w << 5) as usize, 0);
        Ok(())
    }

    /// Borrow an already expanded range. Callers must have called
    /// [Memory::expand] for the same range.
    #[inline(always)]
    pub fn slice(&self, off: &U256, len: &U256) -> &[u8] {
        if len.is_zero() {
            return &[]
        }
        let off = off.as_usize();
        &self.space[off..off + len.as_usize()]
    }

    #[inline(always)]
    pub fn slice_mut(&mut self, off: &U256, len: &U256) -> &mut [u8] {
        if len.is_zero() {
            return &mut []
        }
        let off = off.as_usize();
        &mut self.space[off..off + len.as_usize()]
    }

    /// Copy as much of `data` as fits into an already expanded range. Bytes
    /// of the range past the end of `data` are left as they were.
    pub fn write(&mut self, off: &U256, len: &U256, data: &[u8]) {
        let dst = self.slice_mut(off, len);
        let n = dst.len().min(data.len());
        dst[..n].copy_from_slice(&data[..n]);
    }
}

#[test]
fn test_expand_charges_once() {
    let mut m = Memory::new();
    let mut gas = GasMeter::new(100);
    m.expand(&0.into(), &0.into(), &mut gas).unwrap();
    assert_eq!((m.len(), gas.used()), (0, 0));
    m.expand(&0.into(), &1.into(), &mut gas).unwrap();
    assert_eq!((m.len(), gas.used()), (32, 3));
    m.expand(&0.into(), &32.into(), &mut gas).unwrap();
    assert_eq!(gas.used(), 3);
    m.expand(&32.into(), &32.into(), &mut gas).unwrap();
    assert_eq!((m.len(), gas.used()), (64, 6));
    assert!(matches!(
        m.expand(&U256::MAX, &1.into(), &mut gas),
        Err(ExecError::OutOfMemory)
    ));
}

#[test]
fn test_expand_checks_gas_first() {
    let mut m = Memory::new();
    let mut gas = GasMeter::new(1000);
    let ret = m.expand(&0.into(), &(1u64 << 30).into(), &mut gas);
    assert!(matches!(ret, Err(ExecError::OutOfGas)));
    assert_eq!(m.len(), 0);
    assert_eq!(gas.remaining(), 1000);
}

#[test]
fn test_write_keeps_tail() {
    let mut m = Memory::new();
    m.expand(&0.into(), &4.into(), &mut GasMeter::new(100)).unwrap();
    m.slice_mut(&0.into(), &4.into()).copy_from_slice(&[9; 4]);
    m.write(&0.into(), &4.into(), &[1, 2]);
    assert_eq!(m.slice(&0.into(), &4.into()), &[1, 2, 9, 9]);
    m.write(&0.into(), &1.into(), &[7, 7, 7]);
    assert_eq!(m.slice(&0.into(), &4.into()), &[7, 2, 9, 9]);
}
