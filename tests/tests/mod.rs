mod test_cancellation;
mod test_hickory;
mod test_lookup_service;
