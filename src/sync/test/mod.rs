mod poller_test;
