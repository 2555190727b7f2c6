use std::ops::{Deref, DerefMut};

pub(crate) trait NullCheck {
    fn is_null(&self) -> bool;
}

impl<T> NullCheck for *const T {
    fn is_null(&self) -> bool {
        (*self as *const T).is_null()
    }
}

impl<T> NullCheck for *mut T {
    fn is_null(&self) -> bool {
        (*self as *const T).is_null()
    }
}

/// Owned handle to a C resource, released through `dealloc` unless null.
#[derive(Debug)]
pub(crate) struct CBox<T: NullCheck> {
    pub(crate) ptr: T,
    dealloc: fn(T),
}

impl<T: NullCheck> CBox<T> {
    pub fn new(ptr: T, dealloc: fn(T)) -> Self {
        Self { ptr, dealloc }
    }
}

impl<T: NullCheck> Drop for CBox<T> {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe {
                (self.dealloc)(std::ptr::read(&self.ptr as *const T));
            }
        }
    }
}

impl<T: NullCheck> Deref for CBox<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.ptr
    }
}

impl<T: NullCheck> DerefMut for CBox<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.ptr
    }
}

unsafe impl<T: NullCheck> Send for CBox<T> {}
unsafe impl<T: NullCheck> Sync for CBox<T> {}

#[cfg(test)]
mod tests {
    use super::CBox;
    use std::{
        ptr,
        sync::atomic::{AtomicBool, Ordering},
    };

    #[test]
    fn released_once_unless_null() {
        static RELEASED: AtomicBool = AtomicBool::new(false);
        let value = 123;
        {
            let ptr = CBox::new(ptr::null::<i32>(), |_| RELEASED.store(true, Ordering::Relaxed));
            assert!(ptr.is_null());
        }
        assert!(!RELEASED.load(Ordering::Relaxed));
        {
            let ptr = CBox::new(&value as *const i32, |_| {
                RELEASED.store(true, Ordering::Relaxed)
            });
            assert_eq!(unsafe { **ptr }, 123);
            assert!(!RELEASED.load(Ordering::Relaxed));
        }
        assert!(RELEASED.load(Ordering::Relaxed));
    }
}
