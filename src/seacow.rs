/// Pixels that are either borrowed from the caller or owned by the image
pub(crate) struct SeaCow<'a, T> {
    inner: SeaCowInner<'a, T>,
}

enum SeaCowInner<'a, T> {
    Borrowed(&'a [T]),
    Boxed(Box<[T]>),
}

impl<'a, T> SeaCow<'a, T> {
    #[inline]
    pub fn borrowed(data: &'a [T]) -> Self {
        Self {
            inner: SeaCowInner::Borrowed(data),
        }
    }

    #[inline]
    pub fn boxed(data: Box<[T]>) -> Self {
        Self {
            inner: SeaCowInner::Boxed(data),
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        match &self.inner {
            SeaCowInner::Borrowed(a) => a,
            SeaCowInner::Boxed(x) => x,
        }
    }

    #[inline]
    pub fn is_borrowed(&self) -> bool {
        matches!(self.inner, SeaCowInner::Borrowed(_))
    }
}

#[test]
fn borrowed_and_boxed() {
    let data = [1u8, 2, 3];
    let b = SeaCow::borrowed(&data[..]);
    assert!(b.is_borrowed());
    assert_eq!(&[1, 2, 3], b.as_slice());

    let o = SeaCow::boxed(vec![4u8, 5].into_boxed_slice());
    assert!(!o.is_borrowed());
    assert_eq!(&[4, 5], o.as_slice());
}
