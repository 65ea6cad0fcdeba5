use super::{FileType, InodeNumber};
use crate::checksum::xor8;
use crate::error::{Error, Result};
use crate::{DIR_ENTRY_SIZE, NAME_LEN};

const TYPE_OFFSET: usize = 4;
const NAME_OFFSET: usize = 5;
const CHECKSUM_OFFSET: usize = NAME_OFFSET + NAME_LEN;

// Directory Entry (64 bytes)
// 0..4 inode number, 4 type, 5..63 name, 63 XOR of bytes 0..63
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub inode: InodeNumber,
    pub entry_type: u8,
    pub name: [u8; NAME_LEN],
    pub checksum: u8,
}

impl DirEntry {
    /// Build an entry with its checksum finalized. Names longer than the
    /// field are truncated; a name that fills it is stored without a NUL.
    pub fn new(inode: InodeNumber, file_type: FileType, name: &[u8]) -> Self {
        let mut field = [0u8; NAME_LEN];
        let len = name.len().min(NAME_LEN);
        field[..len].copy_from_slice(&name[..len]);
        let mut entry = Self {
            inode,
            entry_type: file_type.tag(),
            name: field,
            checksum: 0,
        };
        entry.finalize_checksum();
        entry
    }

    pub fn is_free(&self) -> bool {
        self.inode.0 == 0
    }

    pub fn file_type(&self) -> Option<FileType> {
        FileType::from_tag(self.entry_type)
    }

    /// Name bytes up to the first NUL or the end of the field.
    pub fn name_bytes(&self) -> &[u8] {
        let end = self.name.iter().position(|&c| c == 0).unwrap_or(NAME_LEN);
        &self.name[..end]
    }

    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(self.name_bytes()).into_owned()
    }

    pub fn encode(&self) -> [u8; DIR_ENTRY_SIZE] {
        let mut buf = [0u8; DIR_ENTRY_SIZE];
        buf[..TYPE_OFFSET].copy_from_slice(&self.inode.0.to_le_bytes());
        buf[TYPE_OFFSET] = self.entry_type;
        buf[NAME_OFFSET..CHECKSUM_OFFSET].copy_from_slice(&self.name);
        buf[CHECKSUM_OFFSET] = self.checksum;
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let Some(bytes) = bytes.get(..DIR_ENTRY_SIZE) else {
            return Err(Error::Truncated {
                expected: DIR_ENTRY_SIZE as u64,
                actual: bytes.len() as u64,
            });
        };
        let mut inode = [0u8; 4];
        inode.copy_from_slice(&bytes[..TYPE_OFFSET]);
        let mut name = [0u8; NAME_LEN];
        name.copy_from_slice(&bytes[NAME_OFFSET..CHECKSUM_OFFSET]);
        Ok(Self {
            inode: InodeNumber(u32::from_le_bytes(inode)),
            entry_type: bytes[TYPE_OFFSET],
            name,
            checksum: bytes[CHECKSUM_OFFSET],
        })
    }

    pub fn compute_checksum(&self) -> u8 {
        xor8(&self.encode()[..CHECKSUM_OFFSET])
    }

    pub fn finalize_checksum(&mut self) -> u8 {
        self.checksum = self.compute_checksum();
        self.checksum
    }

    pub fn verify_checksum(&self) -> bool {
        self.checksum == self.compute_checksum()
    }
}
