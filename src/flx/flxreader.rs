use std::io::{Cursor, Error, Read};
use std::mem;
use crate::error::FlxError;

// all multi-byte values in flx files are little-endian

#[inline]
pub fn flx_read_u8<R: Read>(reader: &mut R) -> Result<u8, Error> {
    type V = u8;
    let mut buff = [0; mem::size_of::<V>()];
    reader.read_exact(&mut buff)?;
    Ok(V::from_le_bytes(buff))
}

#[inline]
pub fn flx_read_i8<R: Read>(reader: &mut R) -> Result<i8, Error> {
    type V = i8;
    let mut buff = [0; mem::size_of::<V>()];
    reader.read_exact(&mut buff)?;
    Ok(V::from_le_bytes(buff))
}

#[inline]
pub fn flx_read_u16<R: Read>(reader: &mut R) -> Result<u16, Error> {
    let mut buff = [0; mem::size_of::<u16>()];
    reader.read_exact(&mut buff)?;
    Ok(u16::from_le_bytes(buff))
}

#[inline]
pub fn flx_read_i16<R: Read>(reader: &mut R) -> Result<i16, Error> {
    let mut buff = [0; mem::size_of::<i16>()];
    reader.read_exact(&mut buff)?;
    Ok(i16::from_le_bytes(buff))
}

#[inline]
pub fn flx_read_u32<R: Read>(reader: &mut R) -> Result<u32, Error> {
    type V = u32;
    let mut buff = [0; mem::size_of::<V>()];
    reader.read_exact(&mut buff)?;
    Ok(V::from_le_bytes(buff))
}

#[inline]
pub fn flx_read_i32<R: Read>(reader: &mut R) -> Result<i32, Error> {
    let mut buff = [0; mem::size_of::<i32>()];
    reader.read_exact(&mut buff)?;
    Ok(i32::from_le_bytes(buff))
}

#[inline]
pub fn flx_read_f32<R: Read>(reader: &mut R) -> Result<f32, Error> {
    let mut buff = [0; mem::size_of::<f32>()];
    reader.read_exact(&mut buff)?;
    Ok(f32::from_le_bytes(buff))
}

#[inline]
pub fn flx_read_fixed_bytes<R: Read, const N: usize>(reader: &mut R) -> Result<[u8; N], Error> {
    let mut buff = [0; N];
    reader.read_exact(&mut buff)?;
    Ok(buff)
}


/// A record with a fixed on-disk layout. Records are packed back to back,
/// so `SIZE` is the sum of the sizes of the fields.
pub trait FlxStruct: Sized {
    const SIZE: usize;

    fn read<R: Read>(reader: &mut R) -> Result<Self, Error>;
}

macro_rules! flx_primitive {
    ($t:ty, $read:ident) => {
        impl FlxStruct for $t {
            const SIZE: usize = mem::size_of::<$t>();

            #[inline]
            fn read<R: Read>(reader: &mut R) -> Result<Self, Error> {
                $read(reader)
            }
        }
    };
}

flx_primitive!(u8, flx_read_u8);
flx_primitive!(i8, flx_read_i8);
flx_primitive!(u16, flx_read_u16);
flx_primitive!(i16, flx_read_i16);
flx_primitive!(u32, flx_read_u32);
flx_primitive!(i32, flx_read_i32);
flx_primitive!(f32, flx_read_f32);

impl<T: FlxStruct, const N: usize> FlxStruct for [T; N] {
    const SIZE: usize = T::SIZE * N;

    fn read<R: Read>(reader: &mut R) -> Result<Self, Error> {
        let mut items = Vec::with_capacity(N);
        for _ in 0..N {
            items.push(T::read(reader)?);
        }

        match items.try_into() {
            Ok(array) => Ok(array),
            Err(_) => unreachable!("exactly {N} items were read"),
        }
    }
}


/// fails with `OutOfRange` unless `offset..offset+size` lies inside the buffer
#[inline]
pub fn check_range(buffer: &[u8], offset: usize, size: usize) -> Result<(), FlxError> {
    match offset.checked_add(size) {
        Some(end) if end <= buffer.len() => Ok(()),
        _ => Err(FlxError::OutOfRange { offset, size, len: buffer.len() }),
    }
}

pub fn read_struct<T: FlxStruct>(buffer: &[u8], offset: usize) -> Result<T, FlxError> {
    check_range(buffer, offset, T::SIZE)?;
    let mut reader = Cursor::new(&buffer[offset..offset + T::SIZE]);
    Ok(T::read(&mut reader)?)
}

/// reads `count` consecutive records starting at `offset`
pub fn read_structs<T: FlxStruct>(buffer: &[u8], offset: usize, count: usize) -> Result<Vec<T>, FlxError> {
    read_structs_with(buffer, offset, count, |_, _| {})
}

/// same as `read_structs`, but also calls `on_record` with every record and its absolute offset
pub fn read_structs_with<T, F>(buffer: &[u8], offset: usize, count: usize, mut on_record: F) -> Result<Vec<T>, FlxError>
    where T: FlxStruct,
          F: FnMut(&T, usize),
{
    let size = T::SIZE.checked_mul(count)
        .ok_or(FlxError::OutOfRange { offset, size: usize::MAX, len: buffer.len() })?;
    check_range(buffer, offset, size)?;

    let mut reader = Cursor::new(&buffer[offset..offset + size]);
    let mut result = Vec::with_capacity(count);

    for i in 0..count {
        let record = T::read(&mut reader)?;
        on_record(&record, offset + i * T::SIZE);
        result.push(record);
    }

    Ok(result)
}
