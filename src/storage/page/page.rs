pub type PageId = i32;
pub const PAGE_SIZE: usize = 4096;
pub const INVALID_PAGE_ID: PageId = -1;

pub struct Page {
    id: PageId,
    pin_count: u32,
    dirty_flag: bool,
    data: [u8; PAGE_SIZE],
}

impl Page {
    pub fn new(page_id: PageId) -> Page {
        Page {
            id: page_id,
            pin_count: 0,
            dirty_flag: false,
            data: [0; PAGE_SIZE],
        }
    }

    pub fn get_data(&self) -> &[u8] {
        &self.data
    }

    pub fn get_data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn get_id(&self) -> PageId {
        self.id
    }

    pub fn set_id(&mut self, page_id: PageId) {
        self.id = page_id;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty_flag
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty_flag = dirty;
    }

    pub fn get_pin_count(&self) -> u32 {
        self.pin_count
    }

    pub fn set_pin_count(&mut self, pin_count: u32) {
        self.pin_count = pin_count;
    }

    pub fn pin(&mut self) {
        self.pin_count += 1;
    }

    pub fn reset_memory(&mut self) {
        self.data = [0; PAGE_SIZE];
    }
}
