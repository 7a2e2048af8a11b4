//! Call data layout shared by callers and contracts.
//!
//! A call carries a one-byte function id followed by its arguments, packed
//! back to back. An argument is either a full 32-byte word, a narrow value
//! taking only `ceil(bits / 8)` bytes, or a byte string left-aligned in a
//! word. Contracts know the widths of their own arguments; nothing in the
//! encoding describes them.

use std::str::FromStr;

use crate::common::{Addr, Bytes, U256};
use crate::error::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Arg {
    Word(U256),
    /// `value` must fit in `bits`, which is between 1 and 256.
    Narrow { value: U256, bits: u16 },
    /// At most 32 bytes.
    Bytes(Vec<u8>),
}

impl Arg {
    /// Encoded width in bytes.
    pub fn width(&self) -> usize {
        match self {
            Arg::Word(_) | Arg::Bytes(_) => 32,
            Arg::Narrow { bits, .. } => (*bits as usize + 7) / 8,
        }
    }

    /// Reject arguments that do not fit their slot.
    pub fn check(&self) -> Result<(), Error> {
        let fits = match self {
            Arg::Word(_) => true,
            Arg::Narrow { value, bits } => {
                *bits > 0 && *bits <= 256 && value.bits() <= *bits as usize
            }
            Arg::Bytes(b) => b.len() <= 32,
        };
        if fits {
            Ok(())
        } else {
            Err(Error::Arg(format!("{:?}", self)))
        }
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        let mut word = [0u8; 32];
        match self {
            Arg::Word(v) => v.to_big_endian(&mut word),
            Arg::Narrow { value, .. } => {
                value.to_big_endian(&mut word);
                out.extend_from_slice(&word[32 - self.width()..]);
                return
            }
            Arg::Bytes(b) => word[..b.len()].copy_from_slice(b),
        }
        out.extend_from_slice(&word)
    }
}

impl From<u64> for Arg {
    fn from(v: u64) -> Self {
        Arg::Word(v.into())
    }
}

impl From<U256> for Arg {
    fn from(v: U256) -> Self {
        Arg::Word(v)
    }
}

impl From<&Addr> for Arg {
    fn from(addr: &Addr) -> Self {
        Arg::Word(addr.clone().into())
    }
}

fn parse_value(s: &str) -> Option<U256> {
    match s.strip_prefix("0x") {
        Some("") => None,
        Some(h) => U256::from_str_radix(h, 16).ok(),
        None if s.is_empty() => None,
        None => U256::from_dec_str(s).ok(),
    }
}

impl FromStr for Arg {
    type Err = Error;

    /// Accepts `42`, `0x2a`, `5:11` (5 in an 11-bit slot) and `"george"`.
    fn from_str(s: &str) -> Result<Self, Error> {
        let bad = || Error::Arg(s.to_string());
        if let Some(text) =
            s.strip_prefix('"').and_then(|t| t.strip_suffix('"'))
        {
            let arg = Arg::Bytes(text.as_bytes().to_vec());
            return arg.check().map(|()| arg).map_err(|_| bad())
        }
        match s.rsplit_once(':') {
            Some((value, bits)) => {
                let value = parse_value(value).ok_or_else(bad)?;
                let bits: u16 = bits.parse().map_err(|_| bad())?;
                let arg = Arg::Narrow { value, bits };
                arg.check().map(|()| arg).map_err(|_| bad())
            }
            None => Ok(Arg::Word(parse_value(s).ok_or_else(bad)?)),
        }
    }
}

pub fn parse_args(args: &[&str]) -> Result<Vec<Arg>, Error> {
    args.iter().map(|a| a.parse()).collect()
}

pub fn encode_call(funid: u8, args: &[Arg]) -> Result<Bytes, Error> {
    let mut out = Vec::with_capacity(1 + args.len() * 32);
    out.push(funid);
    for arg in args {
        arg.check()?;
        arg.encode_into(&mut out)
    }
    Ok(out.into())
}

/// Split return data into words; a short tail is padded on the right.
pub fn decode_words(output: &[u8]) -> Vec<U256> {
    output
        .chunks(32)
        .map(|chunk| {
            let mut word = [0u8; 32];
            word[..chunk.len()].copy_from_slice(chunk);
            U256::from_big_endian(&word)
        })
        .collect()
}

#[test]
fn test_parse_args() {
    let args = parse_args(&["42", "0x10", "5:11", "\"george\""]).unwrap();
    assert_eq!(args[0], Arg::Word(42.into()));
    assert_eq!(args[1], Arg::Word(16.into()));
    assert_eq!(
        args[2],
        Arg::Narrow {
            value: 5.into(),
            bits: 11
        }
    );
    assert_eq!(args[3], Arg::Bytes(b"george".to_vec()));
    assert!("300:8".parse::<Arg>().is_err());
    assert!("5:0".parse::<Arg>().is_err());
    assert!("five".parse::<Arg>().is_err());
}

#[test]
fn test_encode_widths() {
    let args = parse_args(&["5:11", "6:19", "7:32", "8", "9:20"]).unwrap();
    let data = encode_call(2, &args).unwrap();
    assert_eq!(data.len(), 1 + 2 + 3 + 4 + 32 + 3);
    assert_eq!(data[0], 2);
    assert_eq!(&data[1..3], &[0, 5]);
    assert_eq!(&data[3..6], &[0, 0, 6]);
    assert_eq!(&data[6..10], &[0, 0, 0, 7]);
    assert_eq!(data[41], 8);
    assert_eq!(&data[42..], &[0, 0, 9]);
}

#[test]
fn test_bytes_left_aligned() {
    let data = encode_call(0, &[Arg::Bytes(b"ab".to_vec())]).unwrap();
    assert_eq!(&data[1..3], b"ab");
    assert!(data[3..].iter().all(|b| *b == 0));
    let words = decode_words(&data[1..]);
    assert_eq!(words.len(), 1);
    assert_eq!(words[0] >> 240, U256::from(0x6162));
}

#[test]
fn test_decode_short_tail() {
    let words = decode_words(&[1; 33]);
    assert_eq!(words.len(), 2);
    assert_eq!(words[1], U256::from(1) << 248);
    assert!(decode_words(&[]).is_empty());
}

#[test]
fn test_encode_rejects_oversized() {
    let long = Arg::Bytes(vec![7; 33]);
    assert!(matches!(encode_call(0, &[long]), Err(Error::Arg(_))));
    assert!("\"0123456789abcdef0123456789abcdefX\"".parse::<Arg>().is_err());
    let wide = Arg::Narrow {
        value: 256.into(),
        bits: 8,
    };
    assert!(encode_call(0, &[wide]).is_err());
    let huge = Arg::Narrow {
        value: 1.into(),
        bits: 264,
    };
    assert!(encode_call(0, &[huge]).is_err());
    assert_eq!(
        encode_call(0, &[Arg::Bytes(vec![7; 32])]).unwrap().len(),
        33
    );
}
