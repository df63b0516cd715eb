use std::{
    fmt,
    marker::PhantomData,
    mem,
    ops::{Deref, DerefMut},
};

use bytemuck::{Pod, Zeroable};

/// Number of floats processed by a single vector instruction.
pub const VECTORIZATION_FLOAT_COUNT: usize = 4;

/// Byte width of a vector register, and the alignment of every [`AlignedBuffer`].
pub const VECTORIZATION_BYTE_COUNT: usize = VECTORIZATION_FLOAT_COUNT * mem::size_of::<f32>();

/// Rounds `element_count` up to the next multiple of the vectorization float count.
#[inline]
pub const fn make_aligned_float_element_count(element_count: usize) -> usize {
    if element_count % VECTORIZATION_FLOAT_COUNT == 0 {
        element_count
    } else {
        element_count + VECTORIZATION_FLOAT_COUNT - (element_count % VECTORIZATION_FLOAT_COUNT)
    }
}

#[inline]
pub const fn is_aligned_to_float_element_count(element_count: usize) -> bool {
    element_count % VECTORIZATION_FLOAT_COUNT == 0
}

#[inline]
pub fn is_aligned_to_vectorization_word<T>(ptr: *const T) -> bool {
    (ptr as usize) % VECTORIZATION_BYTE_COUNT == 0
}

#[repr(C, align(16))]
#[derive(Clone, Copy)]
struct VectorWord([f32; VECTORIZATION_FLOAT_COUNT]);

// SAFETY: a plain array of floats with no padding; the alignment only adds
// constraints on where the word is placed, not on its bit patterns.
unsafe impl Zeroable for VectorWord {}
unsafe impl Pod for VectorWord {}

/// A buffer whose storage starts on a vector-word boundary and is padded with
/// zeroed elements up to a multiple of [`VECTORIZATION_FLOAT_COUNT`].
///
/// Derefs to the logical elements only; the padding is reachable through
/// [`AlignedBuffer::as_padded_slice`].
pub struct AlignedBuffer<T: Pod> {
    words: Vec<VectorWord>,
    len: usize,
    _marker: PhantomData<T>,
}

impl<T: Pod> AlignedBuffer<T> {
    /// Creates a zeroed buffer of `len` logical elements.
    pub fn new(len: usize) -> Self {
        assert!(
            mem::size_of::<T>() != 0 && VECTORIZATION_BYTE_COUNT % mem::size_of::<T>() == 0,
            "element size must divide the vectorization word"
        );
        assert!(mem::align_of::<T>() <= VECTORIZATION_BYTE_COUNT);

        let padded_len = make_aligned_float_element_count(len);
        let word_count =
            (padded_len * mem::size_of::<T>() + VECTORIZATION_BYTE_COUNT - 1) / VECTORIZATION_BYTE_COUNT;

        Self {
            words: vec![VectorWord::zeroed(); word_count],
            len,
            _marker: PhantomData,
        }
    }

    pub fn filled(len: usize, value: T) -> Self {
        let mut buffer = Self::new(len);
        buffer.fill(value);
        buffer
    }

    pub fn from_slice(elements: &[T]) -> Self {
        let mut buffer = Self::new(elements.len());
        buffer.as_mut_slice().copy_from_slice(elements);
        buffer
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn padded_len(&self) -> usize {
        make_aligned_float_element_count(self.len)
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.as_padded_slice()[..self.len]
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        let len = self.len;
        &mut self.as_padded_mut_slice()[..len]
    }

    #[inline]
    pub fn as_padded_slice(&self) -> &[T] {
        let padded_len = self.padded_len();
        &bytemuck::cast_slice::<VectorWord, T>(&self.words)[..padded_len]
    }

    #[inline]
    pub fn as_padded_mut_slice(&mut self) -> &mut [T] {
        let padded_len = self.padded_len();
        &mut bytemuck::cast_slice_mut::<VectorWord, T>(&mut self.words)[..padded_len]
    }

    /// Sets every logical element to `value`; the padding stays zeroed.
    pub fn fill(&mut self, value: T) {
        self.as_mut_slice().fill(value)
    }
}

impl<T: Pod> Deref for AlignedBuffer<T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: Pod> DerefMut for AlignedBuffer<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T: Pod> AsRef<[T]> for AlignedBuffer<T> {
    fn as_ref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: Pod> AsMut<[T]> for AlignedBuffer<T> {
    fn as_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T: Pod> Clone for AlignedBuffer<T> {
    fn clone(&self) -> Self {
        Self {
            words: self.words.clone(),
            len: self.len,
            _marker: PhantomData,
        }
    }
}

impl<T: Pod + fmt::Debug> fmt::Debug for AlignedBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}
