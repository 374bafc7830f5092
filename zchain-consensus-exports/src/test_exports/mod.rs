// Copyright (c) 2022 The zchain developers

mod config;
