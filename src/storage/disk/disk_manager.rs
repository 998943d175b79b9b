use crate::storage::page::page::{PageId, PAGE_SIZE};
#[cfg(test)]
use mockall::automock;
use std::fs::{File, OpenOptions};
use std::io::{Error, ErrorKind, Read, Result, Seek, SeekFrom, Write};
use std::path::Path;

#[cfg_attr(test, automock)]
pub trait DiskManager {
    fn allocate_page(&mut self) -> Result<PageId>;

    fn deallocate_page(&mut self, page_id: PageId) -> Result<bool>;

    fn write_page(&mut self, page_id: PageId, page_data: &[u8]) -> Result<()>;

    fn read_page(&mut self, page_id: PageId, page_data: &mut [u8]) -> Result<()>;
}

pub const MAX_FILE_PAGES: usize = 0x1 << 16;

fn validate_page_id(page_id: PageId) -> Result<()> {
    if page_id < 0 || page_id as usize >= MAX_FILE_PAGES {
        return Err(Error::new(ErrorKind::Other, "Invalid page id."));
    }

    Ok(())
}

pub struct FakeDiskManager {
    page_counter: PageId,
    fake_file: Vec<u8>,
}

impl FakeDiskManager {
    pub fn new() -> FakeDiskManager {
        FakeDiskManager {
            page_counter: 0,
            fake_file: vec![0; PAGE_SIZE * MAX_FILE_PAGES],
        }
    }
}

impl Default for FakeDiskManager {
    fn default() -> Self {
        FakeDiskManager::new()
    }
}

impl DiskManager for FakeDiskManager {
    fn allocate_page(&mut self) -> Result<PageId> {
        if self.page_counter as usize >= MAX_FILE_PAGES {
            return Err(Error::new(ErrorKind::Other, "Exceeded max page."));
        }

        let page_id_to_returned = self.page_counter;
        self.page_counter += 1;
        Ok(page_id_to_returned)
    }

    fn deallocate_page(&mut self, page_id: PageId) -> Result<bool> {
        validate_page_id(page_id)?;
        Ok(true)
    }

    fn write_page(&mut self, page_id: PageId, page_data: &[u8]) -> Result<()> {
        validate_page_id(page_id)?;

        let offset = page_id as usize * PAGE_SIZE;
        self.fake_file[offset..offset + PAGE_SIZE].copy_from_slice(&page_data[..PAGE_SIZE]);
        Ok(())
    }

    fn read_page(&mut self, page_id: PageId, page_data: &mut [u8]) -> Result<()> {
        validate_page_id(page_id)?;

        let offset = page_id as usize * PAGE_SIZE;
        page_data[..PAGE_SIZE].copy_from_slice(&self.fake_file[offset..offset + PAGE_SIZE]);
        Ok(())
    }
}

pub struct FileDiskManager {
    page_counter: PageId,
    file: File,
}

impl FileDiskManager {
    pub fn new(file_path: &Path) -> FileDiskManager {
        if !file_path.exists() {
            let new_file = OpenOptions::new()
                .create_new(true)
                .read(true)
                .write(true)
                .open(file_path)
                .unwrap();
            new_file.set_len((PAGE_SIZE * MAX_FILE_PAGES) as u64).unwrap();
        }

        FileDiskManager {
            page_counter: 0,
            file: OpenOptions::new()
                .read(true)
                .write(true)
                .open(file_path)
                .unwrap(),
        }
    }
}

impl DiskManager for FileDiskManager {
    fn allocate_page(&mut self) -> Result<PageId> {
        if self.page_counter as usize >= MAX_FILE_PAGES {
            return Err(Error::new(ErrorKind::Other, "Exceeded max page."));
        }

        let page_id_to_returned = self.page_counter;
        self.page_counter += 1;
        Ok(page_id_to_returned)
    }

    fn deallocate_page(&mut self, page_id: PageId) -> Result<bool> {
        validate_page_id(page_id)?;
        Ok(true)
    }

    fn write_page(&mut self, page_id: PageId, page_data: &[u8]) -> Result<()> {
        validate_page_id(page_id)?;

        self.file
            .seek(SeekFrom::Start(page_id as u64 * PAGE_SIZE as u64))?;
        self.file.write_all(&page_data[..PAGE_SIZE])
    }

    fn read_page(&mut self, page_id: PageId, page_data: &mut [u8]) -> Result<()> {
        validate_page_id(page_id)?;

        self.file
            .seek(SeekFrom::Start(page_id as u64 * PAGE_SIZE as u64))?;
        self.file.read_exact(&mut page_data[..PAGE_SIZE])
    }
}
