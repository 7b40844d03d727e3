//! Aggregates exchanged with the host process.
//!
//! These structs mirror, field for field, the C structs the host allocates and passes by
//! pointer. Their memory is owned by the host; nothing here allocates or frees it. Each
//! aggregate registers its scalar fields for [named lookup](crate::params) and offers an
//! `unsafe` view that turns the raw pointers into checked slices and strings.

#![allow(non_snake_case)]

use std::ffi::CStr;
use std::sync::OnceLock;

use libc::{c_char, c_int};

use crate::errors::ParamError;
use crate::params::{FieldTable, Introspect};

/// Configuration of the parallel loop examples.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ParStruct {
    pub threads: c_int,
    pub N: c_int,
    pub a: f64,
    pub b: f64,
    /// `N` input values
    pub X: *mut f64,
    /// `N` integer weights
    pub Z: *mut c_int,
    /// Name of a single field, looked up as a double
    pub txt: *const c_char,
    /// `|`-delimited field names, looked up as ints
    pub txtlist: *const c_char,
}

/// Output of [`fun`](crate::ffi::fun).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SolStruct {
    /// `N` output values
    pub Y: *mut f64,
}

/// Input and output of the Jacobian example.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct JacobianPar {
    pub Nx: c_int,
    pub Ny: c_int,
    pub alpha: f64,
    pub beta: f64,
    /// `Nx` evaluation point
    pub x: *mut f64,
    /// `Ny` function values
    pub y: *mut f64,
    /// `Ny * Nx` Jacobian, row-major
    pub Jx: *mut f64,
}

impl Introspect for ParStruct {
    fn field_table() -> &'static FieldTable<Self> {
        static TABLE: OnceLock<FieldTable<ParStruct>> = OnceLock::new();
        TABLE.get_or_init(|| {
            FieldTable::<Self>::builder()
                .int("threads", |p| p.threads)
                .int("N", |p| p.N)
                .double("a", |p| p.a)
                .double("b", |p| p.b)
                .build()
        })
    }
}

impl Introspect for JacobianPar {
    fn field_table() -> &'static FieldTable<Self> {
        static TABLE: OnceLock<FieldTable<JacobianPar>> = OnceLock::new();
        TABLE.get_or_init(|| {
            FieldTable::<Self>::builder()
                .int("Nx", |p| p.Nx)
                .int("Ny", |p| p.Ny)
                .double("alpha", |p| p.alpha)
                .double("beta", |p| p.beta)
                .build()
        })
    }
}

/// Checked borrow of the host data behind a [`ParStruct`].
#[derive(Debug, Clone, Copy)]
pub struct ParView<'a> {
    pub threads: i32,
    pub a: f64,
    pub b: f64,
    pub x: &'a [f64],
    pub z: &'a [i32],
    pub txt: &'a str,
    pub txtlist: &'a str,
}

impl ParStruct {
    /// Borrows the arrays and strings the struct points to.
    ///
    /// # Safety
    /// Non-null pointers must be valid for `N` elements (arrays) or point to
    /// NUL-terminated strings, and stay valid and unmodified for `'a`.
    pub unsafe fn view<'a>(&self) -> Result<ParView<'a>, ParamError> {
        let n = checked_len("N", self.N)?;
        Ok(ParView {
            threads: self.threads,
            a: self.a,
            b: self.b,
            x: slice_from_raw("X", self.X, n)?,
            z: slice_from_raw("Z", self.Z, n)?,
            txt: str_from_raw("txt", self.txt)?,
            txtlist: str_from_raw("txtlist", self.txtlist)?,
        })
    }
}

/// Converts a host size into `usize`, rejecting negative values.
pub fn checked_len(name: &'static str, value: c_int) -> Result<usize, ParamError> {
    usize::try_from(value).map_err(|_| ParamError::NegativeSize {
        name,
        value: i64::from(value),
    })
}

/// Borrows `len` elements starting at `ptr`.
///
/// An empty slice is returned for `len == 0`, whatever the pointer.
///
/// # Safety
/// A non-null `ptr` must be valid for reads of `len` elements for `'a`.
pub unsafe fn slice_from_raw<'a, T>(
    name: &'static str,
    ptr: *const T,
    len: usize,
) -> Result<&'a [T], ParamError> {
    if len == 0 {
        return Ok(&[]);
    }
    if ptr.is_null() {
        return Err(ParamError::NullPointer(name));
    }
    Ok(unsafe { std::slice::from_raw_parts(ptr, len) })
}

/// Mutable counterpart of [`slice_from_raw`].
///
/// # Safety
/// A non-null `ptr` must be valid for reads and writes of `len` elements for `'a`, with no
/// other live reference to that memory.
pub unsafe fn slice_from_raw_mut<'a, T>(
    name: &'static str,
    ptr: *mut T,
    len: usize,
) -> Result<&'a mut [T], ParamError> {
    if len == 0 {
        return Ok(&mut []);
    }
    if ptr.is_null() {
        return Err(ParamError::NullPointer(name));
    }
    Ok(unsafe { std::slice::from_raw_parts_mut(ptr, len) })
}

/// Borrows a NUL-terminated UTF-8 string.
///
/// # Safety
/// A non-null `ptr` must point to a NUL-terminated string valid for `'a`.
pub unsafe fn str_from_raw<'a>(
    name: &'static str,
    ptr: *const c_char,
) -> Result<&'a str, ParamError> {
    if ptr.is_null() {
        return Err(ParamError::NullPointer(name));
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|_| ParamError::InvalidUtf8(name))
}
