// Copyright (c) 2022 The zchain developers

/// Hash size
pub const HASH_SIZE_BYTES: usize = 32;
