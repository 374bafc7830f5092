// Copyright (c) 2022 The zchain developers

mod scenarios;
mod scenarios_fetcher;
mod scenarios_lfb_ticket;
mod scenarios_sync;
mod scenarios_view_change;
mod scenarios_worker;
mod universe;
