//! Word arithmetic. All operations wrap modulo 2^256 and never fail; division
//! by zero yields zero.

use once_cell::sync::OnceCell;
use primitive_types::{U256, U512};

#[inline(always)]
fn sign_bit() -> &'static U256 {
    static V: OnceCell<U256> = OnceCell::new();
    V.get_or_init(|| U256::one() << 255)
}

#[inline(always)]
fn from_bool(b: bool) -> U256 {
    if b {
        U256::one()
    } else {
        U256::zero()
    }
}

/// Two's complement negation.
#[inline(always)]
pub fn neg(a: U256) -> U256 {
    (!a).overflowing_add(U256::one()).0
}

#[inline(always)]
fn is_negative(a: &U256) -> bool {
    a.bit(255)
}

#[inline(always)]
fn abs(a: U256) -> U256 {
    if is_negative(&a) {
        neg(a)
    } else {
        a
    }
}

#[inline(always)]
pub fn add(a: U256, b: U256) -> U256 {
    a.overflowing_add(b).0
}

#[inline(always)]
pub fn sub(a: U256, b: U256) -> U256 {
    a.overflowing_sub(b).0
}

#[inline(always)]
pub fn mul(a: U256, b: U256) -> U256 {
    a.overflowing_mul(b).0
}

#[inline(always)]
pub fn div(a: U256, b: U256) -> U256 {
    a.checked_div(b).unwrap_or_default()
}

#[inline(always)]
pub fn rem(a: U256, b: U256) -> U256 {
    a.checked_rem(b).unwrap_or_default()
}

#[inline(always)]
pub fn sdiv(a: U256, b: U256) -> U256 {
    let q = div(abs(a), abs(b));
    if is_negative(&a) != is_negative(&b) {
        neg(q)
    } else {
        q
    }
}

/// Signed remainder; the result takes the sign of the dividend.
#[inline(always)]
pub fn smod(a: U256, b: U256) -> U256 {
    let r = rem(abs(a), abs(b));
    if is_negative(&a) {
        neg(r)
    } else {
        r
    }
}

#[inline(always)]
pub fn add_mod(a: U256, b: U256, n: U256) -> U256 {
    if n.is_zero() {
        return U256::zero()
    }
    let r = (U512::from(a) + U512::from(b)) % U512::from(n);
    U256::try_from(r).unwrap_or_default()
}

#[inline(always)]
pub fn mul_mod(a: U256, b: U256, n: U256) -> U256 {
    if n.is_zero() {
        return U256::zero()
    }
    let r = a.full_mul(b) % U512::from(n);
    U256::try_from(r).unwrap_or_default()
}

#[inline(always)]
pub fn exp(a: U256, b: U256) -> U256 {
    a.overflowing_pow(b).0
}

/// Extend the sign of the `(k + 1)`-byte integer held in the low bytes of `x`.
#[inline(always)]
pub fn sign_extend(k: U256, x: U256) -> U256 {
    if k >= U256::from(31) {
        return x
    }
    let bits = (k.as_usize() + 1) * 8;
    let low_mask = (U256::one() << bits) - U256::one();
    if x.bit(bits - 1) {
        x | !low_mask
    } else {
        x & low_mask
    }
}

#[inline(always)]
pub fn lt(a: U256, b: U256) -> U256 {
    from_bool(a < b)
}

#[inline(always)]
pub fn gt(a: U256, b: U256) -> U256 {
    from_bool(a > b)
}

// Flipping the sign bit maps two's complement order onto unsigned order.
#[inline(always)]
pub fn slt(a: U256, b: U256) -> U256 {
    from_bool((a ^ *sign_bit()) < (b ^ *sign_bit()))
}

#[inline(always)]
pub fn sgt(a: U256, b: U256) -> U256 {
    from_bool((a ^ *sign_bit()) > (b ^ *sign_bit()))
}

#[inline(always)]
pub fn eq(a: U256, b: U256) -> U256 {
    from_bool(a == b)
}

#[inline(always)]
pub fn is_zero(a: U256) -> U256 {
    from_bool(a.is_zero())
}

#[inline(always)]
pub fn and(a: U256, b: U256) -> U256 {
    a & b
}

#[inline(always)]
pub fn or(a: U256, b: U256) -> U256 {
    a | b
}

#[inline(always)]
pub fn xor(a: U256, b: U256) -> U256 {
    a ^ b
}

#[inline(always)]
pub fn not(a: U256) -> U256 {
    !a
}

/// The `i`-th byte of `x`, counting from the most significant one.
#[inline(always)]
pub fn byte(i: U256, x: U256) -> U256 {
    if i >= U256::from(32) {
        return U256::zero()
    }
    U256::from(x.byte(31 - i.as_usize()))
}

#[inline(always)]
pub fn shl(s: U256, val: U256) -> U256 {
    if s >= U256::from(256) {
        U256::zero()
    } else {
        val << s.as_usize()
    }
}

#[inline(always)]
pub fn shr(s: U256, val: U256) -> U256 {
    if s >= U256::from(256) {
        U256::zero()
    } else {
        val >> s.as_usize()
    }
}

#[inline(always)]
pub fn sar(s: U256, val: U256) -> U256 {
    if !is_negative(&val) {
        return shr(s, val)
    }
    // arithmetic shift of a negative number is the complement of a logical
    // shift of its complement
    !shr(s, !val)
}

#[cfg(test)]
fn signed(x: i64) -> U256 {
    if x < 0 {
        neg(U256::from(x.unsigned_abs()))
    } else {
        U256::from(x as u64)
    }
}

#[test]
fn test_signed_division() {
    for i in -50i64..=50 {
        for j in -50i64..=50 {
            let (a, b) = (signed(i), signed(j));
            let (q, r) = (sdiv(a, b), smod(a, b));
            if j == 0 {
                assert!(q.is_zero() && r.is_zero());
            } else {
                assert_eq!(q, signed(i / j), "{} / {}", i, j);
                assert_eq!(r, signed(i % j), "{} % {}", i, j);
            }
        }
    }
}

#[test]
fn test_signed_compare() {
    for i in -3i64..=3 {
        for j in -3i64..=3 {
            assert_eq!(slt(signed(i), signed(j)), from_bool(i < j));
            assert_eq!(sgt(signed(i), signed(j)), from_bool(i > j));
        }
    }
}

#[test]
fn test_shifts() {
    assert_eq!(shl(4.into(), 1.into()), 16.into());
    assert_eq!(shr(256.into(), U256::MAX), U256::zero());
    assert_eq!(sar(1.into(), signed(-8)), signed(-4));
    assert_eq!(sar(300.into(), signed(-8)), U256::MAX);
    assert_eq!(sar(2.into(), signed(8)), signed(2));
}

#[test]
fn test_byte_and_sign_extend() {
    let x = U256::from(0x1234u64);
    assert_eq!(byte(31.into(), x), 0x34.into());
    assert_eq!(byte(30.into(), x), 0x12.into());
    assert_eq!(byte(32.into(), x), U256::zero());
    assert_eq!(sign_extend(0.into(), 0xffu64.into()), U256::MAX);
    assert_eq!(sign_extend(0.into(), 0x7fu64.into()), 0x7f.into());
    assert_eq!(sign_extend(1.into(), 0x1_8000u64.into()), signed(-0x8000));
}

#[test]
fn test_modular() {
    assert_eq!(add_mod(U256::MAX, 2.into(), 10.into()), 7.into());
    assert_eq!(mul_mod(U256::MAX, U256::MAX, 7.into()), 1.into());
    assert_eq!(add_mod(1.into(), 2.into(), U256::zero()), U256::zero());
}
