use std::io;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

pub trait BigEndianReader<T> {
	fn read_val(&mut self) -> Result<T, io::Error>;
}
impl<R: ReadBytesExt> BigEndianReader<u8> for R {
	fn read_val(&mut self) -> Result<u8, io::Error> {
		self.read_u8()
	}
}
macro_rules! derive_reader {
{ $( $m:ident: $t:ty ),*} => {
		$(
			impl<T: ReadBytesExt> BigEndianReader<$t> for T {
				fn read_val(&mut self) -> Result<$t, io::Error> {
						self . $m ::<BigEndian>()
				}
			}
		)*

}
}
derive_reader! { read_u32: u32, read_u16: u16, read_u64: u64 }

pub trait BigEndianWriter<T>: WriteBytesExt {
	fn write_val(&mut self, v: T) -> Result<(), io::Error>;
}
impl<T: WriteBytesExt> BigEndianWriter<u8> for T {
	fn write_val(&mut self, v: u8) -> Result<(), io::Error> {
		self.write_u8(v)
	}
}
impl<T: WriteBytesExt> BigEndianWriter<bool> for T {
	fn write_val(&mut self, v: bool) -> Result<(), io::Error> {
		self.write_u8(if v { 1 } else { 0 })
	}
}
macro_rules! derive_writer {
{ $( $m:ident: $t:ty ),*} => {
	$(
		impl<T: WriteBytesExt> BigEndianWriter<$t> for T {
			fn write_val(&mut self, v: $t) -> Result<(), io::Error> {
				self . $m ::<BigEndian>(v)
			}
		}
	)*

}
}
derive_writer! { write_u32: u32, write_u16: u16, write_u64: u64 }
