use super::params::MAX_STACK_DEPTH;
use super::ExecError;
use crate::common::U256;

/// Operand stack of a frame, bounded by [MAX_STACK_DEPTH].
pub struct Stack(Vec<U256>);

impl Stack {
    pub fn new() -> Self {
        Self(Vec::with_capacity(64))
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline(always)]
    pub fn push(&mut self, val: U256) -> Result<(), ExecError> {
        if self.0.len() == MAX_STACK_DEPTH {
            return Err(ExecError::StackOverflow)
        }
        self.0.push(val);
        Ok(())
    }

    #[inline(always)]
    pub fn pop(&mut self) -> Result<U256, ExecError> {
        self.0.pop().ok_or(ExecError::StackUnderflow)
    }

    /// Pop `N` words; the former top of the stack comes first.
    #[inline(always)]
    pub fn pop_n<const N: usize>(&mut self) -> Result<[U256; N], ExecError> {
        let len = self.0.len();
        if len < N {
            return Err(ExecError::StackUnderflow)
        }
        let mut out = [U256::zero(); N];
        for (o, v) in out.iter_mut().zip(self.0.drain(len - N..).rev()) {
            *o = v
        }
        Ok(out)
    }

    /// Push a copy of the `pos`-th word counting from the top (1-based).
    #[inline(always)]
    pub fn dup(&mut self, pos: usize) -> Result<(), ExecError> {
        let len = self.0.len();
        if pos == 0 || pos > len {
            return Err(ExecError::StackUnderflow)
        }
        self.push(self.0[len - pos])
    }

    /// Exchange the top with the word `pos` places below it.
    #[inline(always)]
    pub fn swap(&mut self, pos: usize) -> Result<(), ExecError> {
        let len = self.0.len();
        if pos >= len {
            return Err(ExecError::StackUnderflow)
        }
        self.0.swap(len - 1, len - 1 - pos);
        Ok(())
    }
}

#[test]
fn test_pop_n_order() {
    let mut s = Stack::new();
    for i in 1..=4u64 {
        s.push(i.into()).unwrap();
    }
    let [a, b, c] = s.pop_n::<3>().unwrap();
    assert_eq!((a, b, c), (4.into(), 3.into(), 2.into()));
    assert_eq!(s.len(), 1);
    assert!(matches!(s.pop_n::<2>(), Err(ExecError::StackUnderflow)));
    // a failed pop leaves the stack as it was
    assert_eq!(s.len(), 1);
}

#[test]
fn test_dup_swap() {
    let mut s = Stack::new();
    s.push(1.into()).unwrap();
    s.push(2.into()).unwrap();
    s.dup(2).unwrap();
    assert_eq!(s.pop().unwrap(), 1.into());
    s.swap(1).unwrap();
    assert_eq!(s.pop().unwrap(), 1.into());
    assert!(s.swap(1).is_err());
    assert!(s.dup(2).is_err());
}

#[test]
fn test_overflow() {
    let mut s = Stack::new();
    for _ in 0..MAX_STACK_DEPTH {
        s.push(U256::zero()).unwrap();
    }
    assert!(matches!(s.push(U256::zero()), Err(ExecError::StackOverflow)));
}
