/// Reverse row order in place. `stride` is bytes per row.
pub fn flip_vertical(data: &mut [u8], stride: usize) {
    if stride == 0 {
        return;
    }
    let rows = data.len() / stride;
    for top in 0..rows / 2 {
        let bottom = rows - 1 - top;
        let (upper, lower) = data.split_at_mut(bottom * stride);
        upper[top * stride..(top + 1) * stride].swap_with_slice(&mut lower[..stride]);
    }
}

/// RGB <-> BGR on packed 3-channel pixels.
pub fn swap_red_blue(data: &mut [u8]) {
    for px in data.chunks_exact_mut(3) {
        px.swap(0, 2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flip_reverses_rows_and_keeps_middle() {
        let mut data = vec![1, 1, 2, 2, 3, 3];
        flip_vertical(&mut data, 2);
        assert_eq!(data, vec![3, 3, 2, 2, 1, 1]);
    }

    #[test]
    fn flip_twice_is_identity() {
        let original: Vec<u8> = (0..24).collect();
        let mut data = original.clone();
        flip_vertical(&mut data, 6);
        assert_ne!(data, original);
        flip_vertical(&mut data, 6);
        assert_eq!(data, original);
    }

    #[test]
    fn swaps_outer_channels() {
        let mut data = vec![10, 20, 30, 40, 50, 60];
        swap_red_blue(&mut data);
        assert_eq!(data, vec![30, 20, 10, 60, 50, 40]);
    }
}
